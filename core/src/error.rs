// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use excal_ews::EwsError;
use thiserror::Error;

/// Errors produced by the synchronization engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote service reported an error.
    #[error("remote service error: {0}")]
    Remote(#[from] EwsError),

    /// The local calendar store reported an error.
    #[error("local store error: {0}")]
    Store(String),

    /// A local event's calendar is marked as synchronized but has no folder
    /// correspondence. Indicates a data-consistency bug, never swallowed.
    #[error("calendar '{0}' has no remote folder correspondence")]
    UnsynchronizedCalendar(String),

    /// The per-user correspondence table could not be loaded. Fatal for the
    /// user's sync session.
    #[error("correspondence table unavailable for user '{user}': {reason}")]
    Correspondence {
        /// The affected user.
        user: String,
        /// Why loading failed.
        reason: String,
    },

    /// The push subscription could not be re-established after a renewal
    /// attempt.
    #[error("subscription renewal failed: {0}")]
    Subscription(String),

    /// A field could not be mapped between the two event schemas.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether this failure means the session credentials were rejected.
    ///
    /// Authentication failures at session start are fatal and are never
    /// retried by the engine itself.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Remote(EwsError::Auth(_)))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
