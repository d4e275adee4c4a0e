// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::notifications::SubscriptionId;
use crate::types::{FolderId, ItemId};

/// Errors reported by an [`EwsClient`](crate::EwsClient) implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EwsError {
    /// The service could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The credentials were rejected by the service.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The item does not exist (any more) on the service.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// The folder does not exist (any more) on the service.
    #[error("folder not found: {0}")]
    FolderNotFound(FolderId),

    /// The requested occurrence index is past the end of the series or was
    /// deleted from it.
    #[error("occurrence {index} of {master} not found")]
    OccurrenceNotFound {
        /// The recurring master the occurrence belongs to.
        master: ItemId,
        /// The 1-based occurrence index that failed to bind.
        index: u32,
    },

    /// The subscription lapsed server-side and must be renewed.
    #[error("subscription expired: {0}")]
    SubscriptionExpired(SubscriptionId),

    /// The service answered with something the client could not interpret.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),
}

impl EwsError {
    /// Whether this error means the addressed object is gone.
    ///
    /// A vanished item or occurrence is routinely observed during
    /// synchronization (deleted concurrently on the server) and is degraded
    /// to a delete by the caller rather than propagated.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ItemNotFound(_) | Self::FolderNotFound(_) | Self::OccurrenceNotFound { .. }
        )
    }
}
