// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Translates local event mutations into remote appointment/folder
//! mutations.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use excal_ews::{
    DeleteMode, EwsClient, FolderId, ItemId, OccurrenceInfo, RemoteAppointment, RemoteFolder,
    WellKnownFolder,
};
use tracing::{error, info, trace, warn};

use crate::convert;
use crate::correspondence::CorrespondenceStore;
use crate::datetime::parse_recurrence_id;
use crate::error::{Result, SyncError};
use crate::event::CalendarEvent;

/// Result of pushing a local event to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The event was written; the remote item now has this id.
    Pushed(ItemId),
    /// The remote counterpart vanished; the caller must delete the local
    /// event instead of recreating remote state.
    DeleteLocal,
}

/// Adapter over the remote service client, scoped to one user.
pub struct RemoteStoreAdapter {
    username: String,
    client: Arc<dyn EwsClient>,
    correspondence: Arc<CorrespondenceStore>,
    tz: Tz,
}

impl RemoteStoreAdapter {
    pub fn new(
        username: impl Into<String>,
        client: Arc<dyn EwsClient>,
        correspondence: Arc<CorrespondenceStore>,
        tz: Tz,
    ) -> Self {
        Self {
            username: username.into(),
            client,
            correspondence,
            tz,
        }
    }

    /// The user's calendar folders: the well-known calendar root and its
    /// subfolders.
    ///
    /// This is the first remote call of a session; an authentication error
    /// from here is fatal for the session.
    pub async fn get_calendar_folders(&self) -> Result<Vec<RemoteFolder>> {
        let root = self
            .client
            .bind_well_known_folder(WellKnownFolder::Calendar)
            .await?;
        let subfolders = self.client.find_subfolders(&root.id).await?;
        let mut folders = Vec::with_capacity(1 + subfolders.len());
        folders.push(root);
        folders.extend(subfolders);
        Ok(folders)
    }

    /// Binds the modified occurrences of a recurring master. Occurrences
    /// that vanish between listing and binding are skipped.
    pub async fn fetch_exception_items(
        &self,
        master_id: &ItemId,
    ) -> Result<Vec<(OccurrenceInfo, RemoteAppointment)>> {
        let infos = self.client.modified_occurrences(master_id).await?;
        let mut items = Vec::with_capacity(infos.len());
        for info in infos {
            match self.client.bind_appointment(&info.item_id).await {
                Ok(appointment) => items.push((info, appointment)),
                Err(e) if e.is_not_found() => {
                    trace!(item = %info.item_id, "modified occurrence vanished before binding");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(items)
    }

    /// Pushes a local event to the remote service, creating or
    /// unconditionally overwriting its appointment.
    ///
    /// The conflict decision already happened upstream; once an event
    /// reaches this adapter the last local write wins. `master_local_id`
    /// names the local master when `event` is an exception occurrence.
    pub async fn create_or_update_appointment(
        &self,
        event: &CalendarEvent,
        master_local_id: Option<&str>,
    ) -> Result<PushOutcome> {
        let Some(folder_id) = self.correspondence.lookup(&event.calendar_id).await? else {
            return Err(SyncError::UnsynchronizedCalendar(event.calendar_id.clone()));
        };
        let folder_id = FolderId::new(folder_id);

        let mut existing_item = None;
        if let Some(item_id) = self.correspondence.lookup(&event.id).await? {
            let item_id = ItemId::new(item_id);
            match self.client.bind_appointment(&item_id).await {
                Ok(_) => existing_item = Some(item_id),
                Err(e) if e.is_not_found() => {
                    trace!(
                        event = %event.id,
                        "mapped item was not bound, it was deleted or not yet created"
                    );
                    self.correspondence.unlink(&event.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if event.is_exception() {
            return self
                .push_exception(event, existing_item, master_local_id, &folder_id)
                .await;
        }

        if existing_item.is_none() && convert::is_derived_event_id(&event.id) {
            // The event originated on the service and its item is gone: it
            // was deleted remotely while the local copy survived.
            warn!(
                user = %self.username,
                event = %event.id,
                "remote-origin event lost its item, deleting the local copy instead of recreating"
            );
            return Ok(PushOutcome::DeleteLocal);
        }

        let appointment = convert::event_to_appointment(event, &folder_id, self.tz);
        let item_id = match existing_item {
            Some(item_id) => {
                info!(user = %self.username, subject = %event.summary, "updating remote appointment");
                self.client.update_appointment(&item_id, &appointment).await?
            }
            None => {
                info!(user = %self.username, subject = %event.summary, "creating remote appointment");
                self.client.create_appointment(&folder_id, &appointment).await?
            }
        };
        self.correspondence.link(&event.id, item_id.as_str()).await?;
        Ok(PushOutcome::Pushed(item_id))
    }

    async fn push_exception(
        &self,
        event: &CalendarEvent,
        existing_item: Option<ItemId>,
        master_local_id: Option<&str>,
        folder_id: &FolderId,
    ) -> Result<PushOutcome> {
        let item_id = match existing_item {
            Some(item_id) => item_id,
            None => {
                let Some(master_local_id) = master_local_id else {
                    return Err(SyncError::Conversion(format!(
                        "exception occurrence '{}' has no master reference",
                        event.id
                    )));
                };
                let Some(master_item) = self.correspondence.lookup(master_local_id).await? else {
                    return Err(SyncError::Conversion(format!(
                        "master '{master_local_id}' of exception '{}' is not mapped to a remote item",
                        event.id
                    )));
                };
                let Some(target) = event
                    .recurrence_id
                    .as_deref()
                    .and_then(parse_recurrence_id)
                else {
                    return Err(SyncError::Conversion(format!(
                        "exception occurrence '{}' carries an unreadable recurrence id",
                        event.id
                    )));
                };
                let target_date = target.with_timezone(&self.tz).date_naive();
                match self
                    .bind_occurrence_by_date(&ItemId::new(master_item), target_date)
                    .await?
                {
                    Some(occurrence) => occurrence.id,
                    None => {
                        error!(
                            user = %self.username,
                            event = %event.id,
                            recurrence_id = event.recurrence_id.as_deref().unwrap_or_default(),
                            "no remote occurrence matches the exception, deleting the local copy"
                        );
                        return Ok(PushOutcome::DeleteLocal);
                    }
                }
            }
        };

        let appointment = convert::event_to_appointment(event, folder_id, self.tz);
        let item_id = self.client.update_appointment(&item_id, &appointment).await?;
        self.correspondence.link(&event.id, item_id.as_str()).await?;
        Ok(PushOutcome::Pushed(item_id))
    }

    /// Finds the occurrence of a series that falls on `target`, binding
    /// successive occurrence indices forward from the series start.
    ///
    /// Stops on a date match, when the series end date is exceeded, or when
    /// the search cursor passes the target date (the occurrence count of an
    /// open-ended series is not known in advance).
    pub async fn bind_occurrence_by_date(
        &self,
        master_id: &ItemId,
        target: NaiveDate,
    ) -> Result<Option<RemoteAppointment>> {
        let master = self.client.bind_appointment(master_id).await?;
        let Some(pattern) = master.recurrence else {
            return Ok(None);
        };
        if let Some(end) = pattern.end_date() {
            if target > end {
                return Ok(None);
            }
        }

        let mut cursor = pattern.start_date;
        let mut index: u32 = 1;
        loop {
            match self.client.bind_occurrence(master_id, index).await {
                Ok(occurrence) => {
                    if occurrence.start.with_timezone(&self.tz).date_naive() == target {
                        return Ok(Some(occurrence));
                    }
                }
                Err(e) if e.is_not_found() => {
                    // Deleted from the series; keep scanning.
                }
                Err(e) => return Err(e.into()),
            }
            index += 1;
            cursor = cursor + Days::new(1);
            if target < cursor {
                return Ok(None);
            }
        }
    }

    /// Deletes a remote item whose local correspondent is gone and releases
    /// the correspondence entry. A vanished item is tolerated.
    pub async fn delete_item(&self, item_id: &ItemId) -> Result<()> {
        match self
            .client
            .delete_appointment(item_id, DeleteMode::HardDelete)
            .await
        {
            Ok(()) => info!(user = %self.username, item = %item_id, "remote item deleted"),
            Err(e) if e.is_not_found() => trace!(item = %item_id, "remote item already gone"),
            Err(e) => return Err(e.into()),
        }
        self.correspondence.unlink(item_id.as_str()).await?;
        Ok(())
    }

    /// Deletes the remote appointment of a locally deleted event and
    /// releases the correspondence entry.
    pub async fn delete_appointment(&self, event: &CalendarEvent) -> Result<()> {
        let Some(item_id) = self.correspondence.lookup(&event.id).await? else {
            trace!(
                event = %event.id,
                "deleted local event has no remote counterpart, ignoring"
            );
            return Ok(());
        };
        if self.correspondence.lookup(&event.calendar_id).await?.is_none() {
            warn!(
                user = %self.username,
                calendar = %event.calendar_id,
                "calendar is not synchronized with a remote folder, skipping remote delete"
            );
        } else {
            let item_id = ItemId::new(item_id);
            match self
                .client
                .delete_appointment(&item_id, DeleteMode::HardDelete)
                .await
            {
                Ok(()) => {
                    info!(user = %self.username, subject = %event.summary, "remote appointment deleted");
                }
                Err(e) if e.is_not_found() => {
                    trace!(event = %event.id, "remote item already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.correspondence.unlink(&event.id).await?;
        Ok(())
    }

    /// Deletes the remote folder of a locally deleted calendar.
    ///
    /// Refused for calendars that originated on the service; their folders
    /// are owned remotely. The folder is moved to trash, not hard-deleted.
    pub async fn delete_folder_for_calendar(&self, calendar_id: &str) -> Result<()> {
        if convert::is_derived_calendar_id(calendar_id) {
            warn!(
                user = %self.username,
                calendar = calendar_id,
                "refusing to delete remote folder, the calendar originated on the service"
            );
            return Ok(());
        }
        let Some(folder_id) = self.correspondence.lookup(calendar_id).await? else {
            warn!(
                user = %self.username,
                calendar = calendar_id,
                "calendar was deleted locally but has no remote folder mapping, ignoring"
            );
            return Ok(());
        };
        match self
            .client
            .delete_folder(&FolderId::new(folder_id), DeleteMode::MoveToDeletedItems)
            .await
        {
            Ok(()) => trace!(calendar = calendar_id, "remote folder moved to trash"),
            Err(e) if e.is_not_found() => {
                trace!(calendar = calendar_id, "remote folder already gone");
            }
            Err(e) => return Err(e.into()),
        }
        self.correspondence.unlink(calendar_id).await?;
        Ok(())
    }
}
