// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::error::{Result, SyncError};

/// Configuration for the synchronization engine.
///
/// Loading (files, environment) is the embedder's concern; the engine only
/// consumes the deserialized struct.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SyncConfig {
    /// URL of the remote groupware service endpoint.
    pub server_url: String,

    /// Mail domain appended to usernames when authenticating.
    pub domain: String,

    /// Delay between two scheduled synchronization runs of a user.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before the first synchronization run after login.
    #[serde(default = "default_first_sync_delay_secs")]
    pub first_sync_delay_secs: u64,

    /// Upper bound on concurrently executing passes across all users.
    #[serde(default = "default_max_concurrent_passes")]
    pub max_concurrent_passes: usize,

    /// Signed offset in minutes added to the remote watermark before
    /// querying the service for modified items. The service timestamps in
    /// UTC; a deployment recording watermarks in local wall-clock time sets
    /// this to its UTC offset. Watermarks written by this engine are UTC, so
    /// the default is 0.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Calendar time zone of the user, used for all-day normalization and
    /// civil-date comparisons.
    #[serde(default = "default_timezone")]
    pub timezone: chrono_tz::Tz,

    /// Whether local calendars are deleted when their remote folder
    /// disappears. When disabled, only the folder mapping is dropped.
    #[serde(default = "default_true")]
    pub cascade_folder_delete: bool,
}

impl SyncConfig {
    /// Validates the configuration.
    pub fn normalize(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(SyncError::Config("server_url must not be empty".into()));
        }
        if self.domain.is_empty() {
            return Err(SyncError::Config("domain must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(SyncError::Config("poll_interval_secs must be positive".into()));
        }
        if self.max_concurrent_passes == 0 {
            return Err(SyncError::Config(
                "max_concurrent_passes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// The first-sync delay as a [`Duration`].
    #[must_use]
    pub const fn first_sync_delay(&self) -> Duration {
        Duration::from_secs(self.first_sync_delay_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            domain: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            first_sync_delay_secs: default_first_sync_delay_secs(),
            max_concurrent_passes: default_max_concurrent_passes(),
            utc_offset_minutes: 0,
            timezone: default_timezone(),
            cascade_folder_delete: true,
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_first_sync_delay_secs() -> u64 {
    10
}

const fn default_max_concurrent_passes() -> usize {
    10
}

fn default_timezone() -> chrono_tz::Tz {
    chrono_tz::UTC
}

const fn default_true() -> bool {
    true
}
