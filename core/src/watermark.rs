// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Per-user synchronization watermarks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::datetime::{epoch_ms, from_epoch_ms};
use crate::error::Result;
use crate::store::LocalCalendarStore;

/// Attribute key of the remote-observed-through watermark.
const REMOTE_KEY: &str = "sync.watermark.remote";

/// Attribute key of the local-observed-through watermark.
const LOCAL_KEY: &str = "sync.watermark.local";

/// The two independent watermarks bounding incremental scans.
///
/// Persisted as millisecond-epoch attributes in the local store. Only the
/// orchestrator writes them, and only after a pass completed; they never
/// move backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermarks {
    /// Last time remote items were scanned.
    pub remote: Option<DateTime<Utc>>,
    /// Last time local items were scanned.
    pub local: Option<DateTime<Utc>>,
}

impl Watermarks {
    /// Loads both watermarks for a user. Absent or unreadable attributes
    /// yield `None` (treated as "never synchronized").
    pub async fn load(store: &Arc<dyn LocalCalendarStore>, username: &str) -> Result<Self> {
        Ok(Self {
            remote: read_stamp(store, username, REMOTE_KEY).await?,
            local: read_stamp(store, username, LOCAL_KEY).await?,
        })
    }

    /// Advances both watermarks to `at`, refusing to move backwards.
    pub async fn advance(
        &mut self,
        store: &Arc<dyn LocalCalendarStore>,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.remote.is_none_or(|current| at > current) {
            store
                .set_attribute(username, REMOTE_KEY, &epoch_ms(at).to_string())
                .await?;
            self.remote = Some(at);
        }
        if self.local.is_none_or(|current| at > current) {
            store
                .set_attribute(username, LOCAL_KEY, &epoch_ms(at).to_string())
                .await?;
            self.local = Some(at);
        }
        Ok(())
    }
}

async fn read_stamp(
    store: &Arc<dyn LocalCalendarStore>,
    username: &str,
    key: &str,
) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = store.attribute(username, key).await? else {
        return Ok(None);
    };
    match raw.parse::<i64>().ok().and_then(from_epoch_ms) {
        Some(stamp) => Ok(Some(stamp)),
        None => {
            warn!(username, key, %raw, "ignoring unreadable watermark attribute");
            Ok(None)
        }
    }
}
