// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Translates remote folder/appointment state into local calendar mutations
//! and reads local state for outbound synchronization.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use excal_ews::{
    AppointmentKind, FolderId, ItemId, OccurrenceInfo, RemoteAppointment, RemoteFolder,
};
use tracing::{debug, info, trace, warn};

use crate::convert;
use crate::correspondence::CorrespondenceStore;
use crate::error::{Result, SyncError};
use crate::event::{CalendarEvent, EventCategory, LocalCalendar, RepeatRule};
use crate::store::LocalCalendarStore;

/// Whether the remote copy wins the conflict: only a strictly newer remote
/// modification may overwrite local state. Equal timestamps do not.
pub(crate) fn remote_wins(event: &CalendarEvent, remote_last_modified: DateTime<Utc>) -> bool {
    remote_last_modified > event.last_modified
}

/// Adapter over the local calendar store, scoped to one user.
pub struct LocalStoreAdapter {
    username: String,
    store: Arc<dyn LocalCalendarStore>,
    correspondence: Arc<CorrespondenceStore>,
    tz: Tz,
}

impl LocalStoreAdapter {
    pub fn new(
        username: impl Into<String>,
        store: Arc<dyn LocalCalendarStore>,
        correspondence: Arc<CorrespondenceStore>,
        tz: Tz,
    ) -> Self {
        Self {
            username: username.into(),
            store,
            correspondence,
            tz,
        }
    }

    /// The local calendar mapped to a remote folder, if any. A mapping whose
    /// calendar no longer exists is dropped.
    pub async fn calendar_for_folder(
        &self,
        folder_id: &FolderId,
    ) -> Result<Option<LocalCalendar>> {
        self.calendar_for_folder_inner(folder_id, true).await
    }

    async fn calendar_for_folder_inner(
        &self,
        folder_id: &FolderId,
        drop_stale_mapping: bool,
    ) -> Result<Option<LocalCalendar>> {
        let Some(calendar_id) = self.correspondence.lookup(folder_id.as_str()).await? else {
            return Ok(None);
        };
        match self.store.calendar(&self.username, &calendar_id).await? {
            Some(calendar) => Ok(Some(calendar)),
            None => {
                if drop_stale_mapping {
                    debug!(%folder_id, %calendar_id, "folder mapping points at a missing calendar, unlinking");
                    self.correspondence.unlink(folder_id.as_str()).await?;
                }
                Ok(None)
            }
        }
    }

    /// The local calendar mirroring a remote folder, created on first sight.
    pub async fn get_or_create_calendar(&self, folder: &RemoteFolder) -> Result<LocalCalendar> {
        if let Some(calendar) = self.calendar_for_folder_inner(&folder.id, false).await? {
            return Ok(calendar);
        }

        let calendar_id = convert::derived_calendar_id(&folder.id);
        if let Some(stale) = self.store.calendar(&self.username, &calendar_id).await? {
            // Leftover of an earlier bootstrap that lost its mapping.
            self.store.remove_calendar(&self.username, &stale.id).await?;
        }

        info!(
            user = %self.username,
            folder = %folder.display_name,
            "creating local calendar for remote folder"
        );
        let calendar = LocalCalendar {
            id: calendar_id,
            name: convert::calendar_display_name(&folder.display_name),
            owner: self.username.clone(),
        };
        self.store
            .save_calendar(&self.username, &calendar, true)
            .await?;
        self.correspondence
            .link(&calendar.id, folder.id.as_str())
            .await?;
        Ok(calendar)
    }

    /// The local event mapped to a remote item, if any. A mapping whose
    /// event no longer exists is dropped.
    pub async fn event_by_item_id(&self, item_id: &ItemId) -> Result<Option<CalendarEvent>> {
        let Some(event_id) = self.correspondence.lookup(item_id.as_str()).await? else {
            return Ok(None);
        };
        match self.store.event(&self.username, &event_id).await? {
            Some(event) => Ok(Some(event)),
            None => {
                self.correspondence.unlink(item_id.as_str()).await?;
                Ok(None)
            }
        }
    }

    /// Applies a remote appointment to the local store and returns every
    /// local event it touched.
    ///
    /// `occurrences` carries the bound modified occurrences of a recurring
    /// master (empty for single appointments). Applying the same unchanged
    /// appointment twice is a no-op: existing state is found through the
    /// correspondence table and the conflict guard skips non-newer data.
    pub async fn create_or_update_event(
        &self,
        appointment: &RemoteAppointment,
        occurrences: &[(OccurrenceInfo, RemoteAppointment)],
        calendar: &LocalCalendar,
    ) -> Result<Vec<CalendarEvent>> {
        let mut is_new = true;
        let mut existing = None;
        if self
            .correspondence
            .lookup(appointment.id.as_str())
            .await?
            .is_some()
        {
            match self.event_by_item_id(&appointment.id).await? {
                Some(event) => {
                    is_new = false;
                    existing = Some(event);
                }
                // event_by_item_id already unlinked the stale mapping
                None => {}
            }
        }

        match appointment.kind {
            AppointmentKind::Single => {
                self.apply_single(appointment, existing, is_new, calendar).await
            }
            AppointmentKind::RecurringMaster => {
                self.apply_master(appointment, occurrences, existing, is_new, calendar)
                    .await
            }
            AppointmentKind::Occurrence | AppointmentKind::ExceptionOccurrence => {
                // Bare occurrences are only reconciled through their master's
                // modified-occurrence list.
                warn!(
                    item = %appointment.id,
                    kind = ?appointment.kind,
                    subject = %appointment.subject,
                    "bare occurrence reached through the item feed, skipping"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn apply_single(
        &self,
        appointment: &RemoteAppointment,
        existing: Option<CalendarEvent>,
        is_new: bool,
        calendar: &LocalCalendar,
    ) -> Result<Vec<CalendarEvent>> {
        let mut event = match existing {
            Some(event) => {
                if !remote_wins(&event, appointment.last_modified) {
                    // Not touched: a pending outbound sync may still push
                    // the local version.
                    trace!(
                        event = %event.id,
                        "local modification is newer, skipping inbound overwrite"
                    );
                    return Ok(Vec::new());
                }
                event
            }
            None => CalendarEvent::new(
                convert::derived_event_id(&appointment.id),
                calendar.id.clone(),
            ),
        };

        if is_new {
            info!(user = %self.username, subject = %appointment.subject, "creating local event");
        } else {
            info!(user = %self.username, subject = %appointment.subject, "updating local event");
        }

        convert::apply_appointment(&mut event, appointment, self.tz);
        event.calendar_id = calendar.id.clone();
        event.repeat = RepeatRule::none();
        event.recurrence_id = None;
        self.resolve_category(&mut event).await?;

        self.store
            .save_event(&self.username, &calendar.id, &event, is_new)
            .await?;
        self.correspondence
            .link(&event.id, appointment.id.as_str())
            .await?;
        Ok(vec![event])
    }

    async fn apply_master(
        &self,
        appointment: &RemoteAppointment,
        occurrences: &[(OccurrenceInfo, RemoteAppointment)],
        existing: Option<CalendarEvent>,
        is_new: bool,
        calendar: &LocalCalendar,
    ) -> Result<Vec<CalendarEvent>> {
        let mut touched = Vec::new();

        let master = match existing {
            Some(event) if !remote_wins(&event, appointment.last_modified) => {
                // Master kept, but its modified occurrences still reconcile.
                trace!(event = %event.id, "local master is newer, keeping local fields");
                event
            }
            other => {
                let mut event = other.unwrap_or_else(|| {
                    CalendarEvent::new(
                        convert::derived_event_id(&appointment.id),
                        calendar.id.clone(),
                    )
                });
                let original_start = if is_new { None } else { Some(event.start) };

                if is_new {
                    info!(user = %self.username, subject = %appointment.subject, "creating local recurring event");
                } else {
                    info!(user = %self.username, subject = %appointment.subject, "updating local recurring event");
                }

                convert::apply_appointment(&mut event, appointment, self.tz);
                event.calendar_id = calendar.id.clone();
                let pattern = appointment.recurrence.as_ref().ok_or_else(|| {
                    SyncError::Conversion(format!(
                        "recurring master '{}' carries no recurrence pattern",
                        appointment.id
                    ))
                })?;
                let excluded = std::mem::take(&mut event.repeat.excluded);
                event.repeat = convert::repeat_from_pattern(pattern);
                event.repeat.excluded = excluded;
                // A moved series start invalidates the recorded exclusions.
                if let Some(original) = original_start {
                    if !crate::datetime::is_same_civil_date(original, event.start, self.tz) {
                        event.repeat.excluded.clear();
                    }
                }
                event.recurrence_id = None;
                self.resolve_category(&mut event).await?;

                self.store
                    .save_event(&self.username, &calendar.id, &event, is_new)
                    .await?;
                touched.push(event.clone());
                event
            }
        };
        self.correspondence
            .link(&master.id, appointment.id.as_str())
            .await?;

        let existing_exceptions = self.store.exception_events(&self.username, &master).await?;
        let plan = convert::plan_exceptions(&master, occurrences, existing_exceptions, self.tz);

        for upsert in plan.upserts {
            if let Some(previous) = upsert.previous_last_modified {
                if upsert.event.last_modified <= previous {
                    // Local exception is at least as new, keep it.
                    self.correspondence
                        .link(&upsert.event.id, upsert.remote_id.as_str())
                        .await?;
                    continue;
                }
            }
            let mut event = upsert.event;
            self.resolve_category(&mut event).await?;
            self.store
                .save_event(&self.username, &master.calendar_id, &event, upsert.is_new)
                .await?;
            self.correspondence
                .link(&event.id, upsert.remote_id.as_str())
                .await?;
            touched.push(event);
        }

        for stale in plan.stale {
            info!(
                user = %self.username,
                event = %stale.id,
                "removing local exception with no remote occurrence"
            );
            self.delete_event(&stale).await?;
        }

        Ok(touched)
    }

    /// Deletes a local event with series-aware semantics and releases its
    /// correspondence entries.
    pub async fn delete_event(&self, event: &CalendarEvent) -> Result<()> {
        if event.is_exception() {
            info!(
                user = %self.username,
                event = %event.id,
                recurrence_id = event.recurrence_id.as_deref().unwrap_or_default(),
                "deleting local occurrence instance"
            );
            self.store
                .remove_occurrence_instance(&self.username, event)
                .await?;
            if self.store.event(&self.username, &event.id).await?.is_some() {
                self.store
                    .remove_event(&self.username, &event.calendar_id, &event.id)
                    .await?;
            }
            self.correspondence.unlink(&event.id).await?;
        } else if event.repeat.is_repeating() {
            info!(user = %self.username, event = %event.id, "deleting local recurring series");
            let children = self.store.exception_events(&self.username, event).await?;
            self.store
                .remove_recurrence_series(&self.username, event)
                .await?;
            for child in children {
                self.correspondence.unlink(&child.id).await?;
            }
            self.correspondence.unlink(&event.id).await?;
        } else {
            info!(user = %self.username, event = %event.id, "deleting local event");
            self.store
                .remove_event(&self.username, &event.calendar_id, &event.id)
                .await?;
            self.correspondence.unlink(&event.id).await?;
        }
        Ok(())
    }

    /// Deletes the local event mapped to a remote item, if any.
    pub async fn delete_event_by_item_id(&self, item_id: &ItemId) -> Result<()> {
        match self.event_by_item_id(item_id).await? {
            Some(event) => self.delete_event(&event).await,
            None => Ok(()),
        }
    }

    /// Deletes the local calendar mirroring a remote folder.
    ///
    /// Never touches calendars of other origin: the calendar must either be
    /// reached through its folder mapping or carry a derived remote-origin
    /// id. Returns whether a calendar was actually removed.
    pub async fn delete_calendar(&self, folder_id: &FolderId) -> Result<bool> {
        let calendar_id = match self.correspondence.lookup(folder_id.as_str()).await? {
            Some(id) => id,
            None => convert::derived_calendar_id(folder_id),
        };
        let removed = self.store.remove_calendar(&self.username, &calendar_id).await?;
        if let Some(calendar) = &removed {
            info!(
                user = %self.username,
                calendar = %calendar.name,
                "local calendar deleted, its remote folder is gone"
            );
        }
        self.correspondence.unlink(folder_id.as_str()).await?;
        Ok(removed.is_some())
    }

    /// Drops the folder mapping of a calendar without deleting the calendar.
    pub async fn unlink_calendar(&self, folder_id: &FolderId) -> Result<()> {
        self.correspondence.unlink(folder_id.as_str()).await
    }

    /// Removes remote-origin calendars whose folder is no longer present on
    /// the service. Calendars created locally are never touched.
    pub async fn delete_unmapped_calendars(&self, live_folders: &[FolderId]) -> Result<()> {
        let live: HashSet<&str> = live_folders.iter().map(FolderId::as_str).collect();
        for calendar in self.store.calendars(&self.username).await? {
            match self.correspondence.lookup(&calendar.id).await? {
                Some(folder_id) if live.contains(folder_id.as_str()) => {}
                Some(_) => {
                    info!(
                        user = %self.username,
                        calendar = %calendar.name,
                        "mapped remote folder disappeared, deleting local calendar"
                    );
                    self.store.remove_calendar(&self.username, &calendar.id).await?;
                    self.correspondence.unlink(&calendar.id).await?;
                }
                None if convert::is_derived_calendar_id(&calendar.id) => {
                    info!(
                        user = %self.username,
                        calendar = %calendar.name,
                        "unmapped remote-origin calendar, deleting"
                    );
                    self.store.remove_calendar(&self.username, &calendar.id).await?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// All events of a calendar, exception occurrences included.
    pub async fn find_events_for_calendar(&self, calendar_id: &str) -> Result<Vec<CalendarEvent>> {
        self.store
            .events_by_calendars(&self.username, &[calendar_id.to_string()])
            .await
    }

    /// Events of a calendar modified strictly after `since`.
    pub async fn find_events_modified_since(
        &self,
        calendar_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let events = self.find_events_for_calendar(calendar_id).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.last_modified > since)
            .collect())
    }

    /// Bumps an event's modification time after an outbound push.
    pub async fn touch_modified(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.store.touch_modified(&self.username, event_id, at).await
    }

    /// Resolves the event's category name to a local category record,
    /// creating the record on first use.
    pub async fn resolve_category(&self, event: &mut CalendarEvent) -> Result<()> {
        let Some(name) = event.category_name.clone() else {
            event.category_id = None;
            return Ok(());
        };
        let category = match self.store.category_by_name(&self.username, &name).await? {
            Some(category) => category,
            None => {
                let category = EventCategory {
                    id: convert::derived_category_id(&name),
                    name: name.clone(),
                };
                self.store.save_category(&self.username, &category).await?;
                category
            }
        };
        event.category_id = Some(category.id);
        event.category_name = Some(category.name);
        Ok(())
    }
}
