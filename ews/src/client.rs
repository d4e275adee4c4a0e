// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The client contract against the remote calendar service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EwsError;
use crate::notifications::{NotificationBatch, SubscriptionId};
use crate::types::{FolderId, ItemId, OccurrenceInfo, RemoteAppointment, RemoteFolder};

/// Folders addressable by a well-known name instead of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownFolder {
    /// The user's default calendar folder.
    Calendar,
    /// The trash folder items are moved to on soft delete.
    DeletedItems,
}

/// How a delete is performed on the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Remove the object permanently.
    HardDelete,
    /// Move the object to the trash folder.
    MoveToDeletedItems,
}

/// Operations the synchronization engine needs from the remote service.
///
/// Implementations wrap the actual transport (SOAP over HTTP for a real
/// deployment, an in-memory store in tests). All methods are cancel-safe:
/// the engine may drop a pending call during session teardown.
#[async_trait]
pub trait EwsClient: Send + Sync {
    /// Binds a folder by its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::FolderNotFound`] when the folder does not exist.
    async fn bind_folder(&self, folder_id: &FolderId) -> Result<RemoteFolder, EwsError>;

    /// Binds a folder by its well-known name.
    ///
    /// The first call of a session authenticates; an [`EwsError::Auth`] from
    /// here is fatal for the session.
    ///
    /// # Errors
    ///
    /// Returns an error when the service is unreachable or rejects the
    /// credentials.
    async fn bind_well_known_folder(
        &self,
        folder: WellKnownFolder,
    ) -> Result<RemoteFolder, EwsError>;

    /// Lists the folders directly below `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::FolderNotFound`] when the parent does not exist.
    async fn find_subfolders(&self, parent: &FolderId) -> Result<Vec<RemoteFolder>, EwsError>;

    /// Lists every appointment in a folder.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::FolderNotFound`] when the folder does not exist.
    async fn find_appointments(
        &self,
        folder_id: &FolderId,
    ) -> Result<Vec<RemoteAppointment>, EwsError>;

    /// Lists appointments whose server-side modification time is strictly
    /// after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::FolderNotFound`] when the folder does not exist.
    async fn find_appointments_modified_after(
        &self,
        folder_id: &FolderId,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteAppointment>, EwsError>;

    /// Binds a single appointment by its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::ItemNotFound`] when the item does not exist.
    async fn bind_appointment(&self, item_id: &ItemId) -> Result<RemoteAppointment, EwsError>;

    /// Binds the `index`-th occurrence (1-based) of a recurring master.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::OccurrenceNotFound`] when the index is past the
    /// series end or the occurrence was deleted from the series.
    async fn bind_occurrence(
        &self,
        master_id: &ItemId,
        index: u32,
    ) -> Result<RemoteAppointment, EwsError>;

    /// Lists the modified occurrences of a recurring master.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::ItemNotFound`] when the master does not exist.
    async fn modified_occurrences(
        &self,
        master_id: &ItemId,
    ) -> Result<Vec<OccurrenceInfo>, EwsError>;

    /// Creates an appointment in `folder_id` and returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::FolderNotFound`] when the folder does not exist.
    async fn create_appointment(
        &self,
        folder_id: &FolderId,
        appointment: &RemoteAppointment,
    ) -> Result<ItemId, EwsError>;

    /// Overwrites an existing appointment unconditionally and returns its
    /// (possibly re-issued) id.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::ItemNotFound`] when the item does not exist.
    async fn update_appointment(
        &self,
        item_id: &ItemId,
        appointment: &RemoteAppointment,
    ) -> Result<ItemId, EwsError>;

    /// Deletes an appointment.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::ItemNotFound`] when the item does not exist.
    async fn delete_appointment(&self, item_id: &ItemId, mode: DeleteMode)
    -> Result<(), EwsError>;

    /// Deletes a folder.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::FolderNotFound`] when the folder does not exist.
    async fn delete_folder(&self, folder_id: &FolderId, mode: DeleteMode) -> Result<(), EwsError>;

    /// Opens a pull subscription over the given folders.
    ///
    /// # Errors
    ///
    /// Returns an error when the service refuses the subscription.
    async fn subscribe(&self, folder_ids: &[FolderId]) -> Result<SubscriptionId, EwsError>;

    /// Closes a pull subscription. Failures are routinely ignored by the
    /// engine since stale subscriptions lapse server-side.
    ///
    /// # Errors
    ///
    /// Returns an error when the subscription is unknown or the service is
    /// unreachable.
    async fn unsubscribe(&self, subscription: &SubscriptionId) -> Result<(), EwsError>;

    /// Drains the change events accumulated on a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`EwsError::SubscriptionExpired`] when the subscription
    /// lapsed and must be renewed.
    async fn poll_subscription(
        &self,
        subscription: &SubscriptionId,
    ) -> Result<NotificationBatch, EwsError>;
}
