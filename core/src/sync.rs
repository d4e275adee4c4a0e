// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The synchronization orchestrator: full and incremental passes, folder
//! lifecycle reconciliation, watermark tracking and conflict resolution.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use excal_ews::{
    EwsClient, FolderChange, FolderId, ItemChange, ItemId, NotificationBatch, RemoteAppointment,
    RemoteEventType, RemoteFolder,
};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::convert;
use crate::correspondence::CorrespondenceStore;
use crate::error::Result;
use crate::event::{CalendarEvent, LocalCalendar};
use crate::local::LocalStoreAdapter;
use crate::remote::{PushOutcome, RemoteStoreAdapter};
use crate::store::LocalCalendarStore;
use crate::watermark::Watermarks;

/// Counters describing what a pass did.
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    /// Local events written from remote data.
    pub pulled: usize,
    /// Remote appointments written from local data.
    pub pushed: usize,
    /// Local events deleted.
    pub deleted_local: usize,
    /// Remote items deleted.
    pub deleted_remote: usize,
    /// Items that failed and were skipped without aborting the pass.
    pub errors: usize,
    /// The pass was skipped because another one was already running.
    pub skipped: bool,
    /// The set of watched folders changed during the pass, so the push
    /// subscription must be renewed.
    pub folders_changed: bool,
    /// The remote folders observed by the pass.
    pub watched_folders: Vec<FolderId>,
}

impl PassSummary {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Resets the running flag when the pass ends, normally or early.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives synchronization for a single user.
///
/// The orchestrator is the sole writer of watermarks and the sole owner of
/// correspondence mutations at pass level; the two adapters act on its
/// behalf. No two passes of the same user ever run concurrently: a pass
/// attempted while another is running is a silent skip, which is always safe
/// because a later scheduler tick retries.
pub struct Orchestrator {
    username: String,
    config: SyncConfig,
    store: Arc<dyn LocalCalendarStore>,
    client: Arc<dyn EwsClient>,
    correspondence: Arc<CorrespondenceStore>,
    local: LocalStoreAdapter,
    remote: RemoteStoreAdapter,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        username: impl Into<String>,
        config: SyncConfig,
        store: Arc<dyn LocalCalendarStore>,
        client: Arc<dyn EwsClient>,
    ) -> Self {
        let username = username.into();
        let correspondence = Arc::new(CorrespondenceStore::new(username.clone(), store.clone()));
        let local = LocalStoreAdapter::new(
            username.clone(),
            store.clone(),
            correspondence.clone(),
            config.timezone,
        );
        let remote = RemoteStoreAdapter::new(
            username.clone(),
            client.clone(),
            correspondence.clone(),
            config.timezone,
        );
        Self {
            username,
            config,
            store,
            client,
            correspondence,
            local,
            remote,
            running: AtomicBool::new(false),
        }
    }

    /// The user this orchestrator synchronizes for.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Pushes a local event deletion to the remote service.
    ///
    /// Called by the embedder's deletion hook; the full pass would
    /// eventually reconcile the same way, this just propagates immediately.
    pub async fn local_event_deleted(&self, event: &CalendarEvent) -> Result<()> {
        self.remote.delete_appointment(event).await
    }

    /// Handles a local calendar deletion: the mirrored remote folder is
    /// moved to trash, unless the calendar originated on the service.
    pub async fn local_calendar_deleted(&self, calendar_id: &str) -> Result<()> {
        self.remote.delete_folder_for_calendar(calendar_id).await
    }

    /// Stops mirroring a remote folder, keeping the local calendar and its
    /// events.
    pub async fn unsynchronize_folder(&self, folder_id: &FolderId) -> Result<()> {
        self.local.unlink_calendar(folder_id).await
    }

    /// The local calendars currently mapped to remote folders.
    pub async fn synced_calendars(&self) -> Result<Vec<LocalCalendar>> {
        let mut mapped = Vec::new();
        for calendar in self.store.calendars(&self.username).await? {
            if self.correspondence.lookup(&calendar.id).await?.is_some() {
                mapped.push(calendar);
            }
        }
        Ok(mapped)
    }

    /// Authoritative reconciliation of every remote folder with its local
    /// calendar.
    ///
    /// Binds all folders, creates missing calendars, enumerates both sides
    /// completely, applies the converter in both directions, and removes
    /// objects whose correspondent on the other side is gone. Watermarks
    /// advance to the pass-start time on completion.
    pub async fn full_pass(&self) -> Result<PassSummary> {
        let Some(_guard) = self.try_begin() else {
            debug!(user = %self.username, "a pass is already running, skipping");
            return Ok(PassSummary::skipped());
        };
        let started = Utc::now();
        info!(user = %self.username, "starting full synchronization pass");

        let mut summary = PassSummary::default();
        let mut synced = HashSet::new();

        let folders = self.remote.get_calendar_folders().await?;
        let folder_ids: Vec<FolderId> = folders.iter().map(|f| f.id.clone()).collect();
        if self.config.cascade_folder_delete {
            self.local.delete_unmapped_calendars(&folder_ids).await?;
        }

        for folder in &folders {
            if let Err(e) = self.sync_folder_full(folder, &mut summary, &mut synced).await {
                warn!(
                    user = %self.username,
                    folder = %folder.id,
                    error = %e,
                    "folder synchronization failed, continuing with remaining folders"
                );
                summary.errors += 1;
            }
        }

        let mut watermarks = Watermarks::load(&self.store, &self.username).await?;
        watermarks
            .advance(&self.store, &self.username, started)
            .await?;

        summary.watched_folders = folder_ids;
        info!(
            user = %self.username,
            pulled = summary.pulled,
            pushed = summary.pushed,
            deleted_local = summary.deleted_local,
            deleted_remote = summary.deleted_remote,
            errors = summary.errors,
            "full synchronization pass completed"
        );
        Ok(summary)
    }

    /// Reconciliation limited to changes since the watermarks, plus the
    /// change events drained from the push subscription.
    ///
    /// Folder-level events are applied before item-level events since new
    /// folders may introduce item events referencing them. Watermarks
    /// advance to the pass-start time on completion.
    pub async fn incremental_pass(&self, batch: Option<&NotificationBatch>) -> Result<PassSummary> {
        let Some(_guard) = self.try_begin() else {
            debug!(user = %self.username, "a pass is already running, skipping");
            return Ok(PassSummary::skipped());
        };
        let started = Utc::now();
        info!(user = %self.username, "starting incremental synchronization pass");

        let mut summary = PassSummary::default();
        let mut synced = HashSet::new();
        let mut watermarks = Watermarks::load(&self.store, &self.username).await?;

        if let Some(batch) = batch {
            self.apply_folder_changes(&batch.folder_changes, &mut summary, &mut synced)
                .await?;
        }

        let folders = self.remote.get_calendar_folders().await?;
        let folder_ids: Vec<FolderId> = folders.iter().map(|f| f.id.clone()).collect();

        if let Some(batch) = batch {
            for change in &batch.item_changes {
                if let Err(e) = self.apply_item_change(change, &mut summary, &mut synced).await {
                    warn!(
                        user = %self.username,
                        item = %change.item_id,
                        error = %e,
                        "item change failed, skipping"
                    );
                    summary.errors += 1;
                }
            }
        }

        for folder in &folders {
            if let Err(e) = self
                .scan_folder(folder, watermarks, &mut summary, &mut synced)
                .await
            {
                warn!(
                    user = %self.username,
                    folder = %folder.id,
                    error = %e,
                    "folder scan failed, continuing with remaining folders"
                );
                summary.errors += 1;
            }
        }

        watermarks
            .advance(&self.store, &self.username, started)
            .await?;

        summary.watched_folders = folder_ids;
        info!(
            user = %self.username,
            pulled = summary.pulled,
            pushed = summary.pushed,
            deleted_local = summary.deleted_local,
            deleted_remote = summary.deleted_remote,
            errors = summary.errors,
            "incremental synchronization pass completed"
        );
        Ok(summary)
    }

    fn try_begin(&self) -> Option<PassGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard(&self.running))
    }

    /// Authoritative two-way reconciliation of one folder.
    async fn sync_folder_full(
        &self,
        folder: &RemoteFolder,
        summary: &mut PassSummary,
        synced: &mut HashSet<String>,
    ) -> Result<()> {
        let calendar = self.local.get_or_create_calendar(folder).await?;

        let appointments = self.client.find_appointments(&folder.id).await?;
        let mut remote_item_ids = HashSet::new();
        for appointment in &appointments {
            remote_item_ids.insert(appointment.id.as_str().to_string());

            // A correspondence entry whose local event is gone means the
            // event was deleted locally; the remote item follows.
            if let Some(local_id) = self.correspondence.lookup(appointment.id.as_str()).await? {
                if self.store.event(&self.username, &local_id).await?.is_none() {
                    info!(
                        user = %self.username,
                        item = %appointment.id,
                        "local event is gone, deleting remote item"
                    );
                    self.remote.delete_item(&appointment.id).await?;
                    summary.deleted_remote += 1;
                    continue;
                }
            }

            match self.apply_remote_appointment(appointment, &calendar).await {
                Ok(events) => {
                    summary.pulled += events.len();
                    synced.extend(events.into_iter().map(|e| e.id));
                }
                Err(e) => {
                    warn!(
                        user = %self.username,
                        item = %appointment.id,
                        error = %e,
                        "appointment failed to apply, skipping"
                    );
                    summary.errors += 1;
                }
            }
        }

        // Local sweep: push what only exists here, drop what lost its
        // remote correspondent.
        let events = self.local.find_events_for_calendar(&calendar.id).await?;
        for event in events {
            if synced.contains(&event.id) {
                continue;
            }
            if event.is_exception() {
                // Mapped exceptions were reconciled through their master;
                // unmapped ones were created locally and still need a push.
                if self.correspondence.lookup(&event.id).await?.is_none() {
                    self.push_event_logged(&event, summary, synced).await;
                }
                continue;
            }
            match self.correspondence.lookup(&event.id).await? {
                Some(item_id) if remote_item_ids.contains(&item_id) => {}
                Some(_) => {
                    info!(
                        user = %self.username,
                        event = %event.id,
                        "remote correspondent is gone, deleting local event"
                    );
                    if let Err(e) = self.local.delete_event(&event).await {
                        warn!(user = %self.username, event = %event.id, error = %e, "delete failed, skipping");
                        summary.errors += 1;
                    } else {
                        summary.deleted_local += 1;
                    }
                }
                None if convert::is_derived_event_id(&event.id) => {
                    info!(
                        user = %self.username,
                        event = %event.id,
                        "remote-origin event lost its mapping and its item, deleting"
                    );
                    if let Err(e) = self.local.delete_event(&event).await {
                        warn!(user = %self.username, event = %event.id, error = %e, "delete failed, skipping");
                        summary.errors += 1;
                    } else {
                        summary.deleted_local += 1;
                    }
                }
                None => self.push_event_logged(&event, summary, synced).await,
            }
        }
        Ok(())
    }

    /// Applies one remote appointment to the local store, binding the
    /// modified occurrences of recurring masters first.
    async fn apply_remote_appointment(
        &self,
        appointment: &RemoteAppointment,
        calendar: &LocalCalendar,
    ) -> Result<Vec<CalendarEvent>> {
        let occurrences = if appointment.recurrence.is_some() {
            self.remote.fetch_exception_items(&appointment.id).await?
        } else {
            Vec::new()
        };
        self.local
            .create_or_update_event(appointment, &occurrences, calendar)
            .await
    }

    /// Folder-level feed events, reconciled before any item-level work.
    async fn apply_folder_changes(
        &self,
        changes: &[FolderChange],
        summary: &mut PassSummary,
        synced: &mut HashSet<String>,
    ) -> Result<()> {
        for change in changes {
            match change.event_type {
                RemoteEventType::Created | RemoteEventType::Modified => {
                    if self
                        .local
                        .calendar_for_folder(&change.folder_id)
                        .await?
                        .is_some()
                    {
                        continue;
                    }
                    match self.client.bind_folder(&change.folder_id).await {
                        Ok(folder) => {
                            self.sync_folder_full(&folder, summary, synced).await?;
                            summary.folders_changed = true;
                        }
                        Err(e) if e.is_not_found() => {
                            debug!(folder = %change.folder_id, "folder event for a folder that no longer exists");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                RemoteEventType::Deleted | RemoteEventType::Moved => {
                    // The feed also reports moves within the watched set;
                    // only act when the folder is really gone.
                    match self.client.bind_folder(&change.folder_id).await {
                        Ok(_) => {
                            info!(
                                folder = %change.folder_id,
                                "folder still present despite delete event, ignoring"
                            );
                        }
                        Err(e) if e.is_not_found() => {
                            let deleted = if self.config.cascade_folder_delete {
                                self.local.delete_calendar(&change.folder_id).await?
                            } else {
                                self.local.unlink_calendar(&change.folder_id).await?;
                                false
                            };
                            if deleted {
                                summary.folders_changed = true;
                            }
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                RemoteEventType::FreeBusyChanged => {
                    warn!(folder = %change.folder_id, "unexpected folder event type, ignoring");
                }
            }
        }
        Ok(())
    }

    /// One item-level feed event: bind the item and create/update, or treat
    /// a failed bind as a concurrent delete.
    async fn apply_item_change(
        &self,
        change: &ItemChange,
        summary: &mut PassSummary,
        synced: &mut HashSet<String>,
    ) -> Result<()> {
        let appointment = match self.client.bind_appointment(&change.item_id).await {
            Ok(appointment) => appointment,
            Err(e) if e.is_not_found() => {
                if let Some(event) = self.local.event_by_item_id(&change.item_id).await? {
                    info!(
                        user = %self.username,
                        item = %change.item_id,
                        "item deleted remotely, removing local event"
                    );
                    self.local.delete_event(&event).await?;
                    summary.deleted_local += 1;
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(calendar) = self
            .local
            .calendar_for_folder(&appointment.parent_folder_id)
            .await?
        else {
            warn!(
                user = %self.username,
                item = %change.item_id,
                "item event for an unsynchronized folder, skipping"
            );
            return Ok(());
        };

        let events = self.apply_remote_appointment(&appointment, &calendar).await?;
        summary.pulled += events.len();
        synced.extend(events.into_iter().map(|e| e.id));
        Ok(())
    }

    /// Incremental two-way scan of one folder.
    async fn scan_folder(
        &self,
        folder: &RemoteFolder,
        watermarks: Watermarks,
        summary: &mut PassSummary,
        synced: &mut HashSet<String>,
    ) -> Result<()> {
        let calendar = match self.local.calendar_for_folder(&folder.id).await? {
            Some(calendar) => calendar,
            None => {
                // Newly appeared folder: authoritative sync and subscription
                // renewal.
                self.sync_folder_full(folder, summary, synced).await?;
                summary.folders_changed = true;
                return Ok(());
            }
        };
        let Some(remote_wm) = watermarks.remote else {
            self.sync_folder_full(folder, summary, synced).await?;
            return Ok(());
        };
        let local_wm = watermarks.local.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        // Inbound: remote items modified since the remote watermark.
        let since = crate::datetime::adjusted_since(remote_wm, self.config.utc_offset_minutes);
        let items = self
            .client
            .find_appointments_modified_after(&folder.id, since)
            .await?;
        for appointment in items {
            if let Some(local_id) = self.correspondence.lookup(appointment.id.as_str()).await? {
                if synced.contains(&local_id) {
                    continue;
                }
            }
            match self.apply_remote_appointment(&appointment, &calendar).await {
                Ok(events) => {
                    summary.pulled += events.len();
                    synced.extend(events.into_iter().map(|e| e.id));
                }
                Err(e) => {
                    warn!(
                        user = %self.username,
                        item = %appointment.id,
                        error = %e,
                        "appointment failed to apply, skipping"
                    );
                    summary.errors += 1;
                }
            }
        }

        // Events whose remote item vanished: recently modified ones are
        // pushed back, the rest follow the remote deletion.
        let events = self.local.find_events_for_calendar(&calendar.id).await?;
        for event in events {
            if synced.contains(&event.id) {
                continue;
            }
            let mapped = self.correspondence.lookup(&event.id).await?;
            let present_remotely = match &mapped {
                Some(item_id) => {
                    match self.client.bind_appointment(&ItemId::new(item_id.clone())).await {
                        Ok(_) => true,
                        Err(e) if e.is_not_found() => false,
                        Err(e) => return Err(e.into()),
                    }
                }
                None => false,
            };
            if present_remotely {
                continue;
            }
            if event.last_modified > local_wm {
                self.push_event_logged(&event, summary, synced).await;
            } else {
                info!(
                    user = %self.username,
                    event = %event.id,
                    "remote counterpart is gone, deleting local event"
                );
                match self.local.delete_event(&event).await {
                    Ok(()) => summary.deleted_local += 1,
                    Err(e) => {
                        warn!(user = %self.username, event = %event.id, error = %e, "delete failed, skipping");
                        summary.errors += 1;
                    }
                }
            }
        }

        // Outbound: local events modified since the local watermark that
        // this pass has not already written.
        let modified = self
            .local
            .find_events_modified_since(&calendar.id, local_wm)
            .await?;
        for event in modified {
            if synced.contains(&event.id) {
                continue;
            }
            self.push_event_logged(&event, summary, synced).await;
        }
        Ok(())
    }

    /// Pushes one local event, degrading a vanished remote counterpart to a
    /// local delete. Failures are logged and skipped so one bad item never
    /// aborts the batch.
    async fn push_event_logged(
        &self,
        event: &CalendarEvent,
        summary: &mut PassSummary,
        synced: &mut HashSet<String>,
    ) {
        let result = self
            .remote
            .create_or_update_appointment(event, event.master_id.as_deref())
            .await;
        match result {
            Ok(PushOutcome::Pushed(_)) => {
                // Refresh the local stamp so the next inbound scan does not
                // re-import what was just exported.
                if let Err(e) = self.local.touch_modified(&event.id, Utc::now()).await {
                    warn!(user = %self.username, event = %event.id, error = %e, "touch after push failed");
                }
                synced.insert(event.id.clone());
                summary.pushed += 1;
            }
            Ok(PushOutcome::DeleteLocal) => match self.local.delete_event(event).await {
                Ok(()) => summary.deleted_local += 1,
                Err(e) => {
                    warn!(user = %self.username, event = %event.id, error = %e, "delete failed, skipping");
                    summary.errors += 1;
                }
            },
            Err(e) => {
                warn!(
                    user = %self.username,
                    event = %event.id,
                    error = %e,
                    "outbound push failed, skipping"
                );
                summary.errors += 1;
            }
        }
    }
}
