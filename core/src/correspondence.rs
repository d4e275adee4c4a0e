// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Persistent bidirectional map between local and remote identifiers.

use std::collections::BTreeMap;
use std::sync::Arc;

use bimap::BiMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::store::LocalCalendarStore;

/// Attribute key the correspondence table is persisted under.
const ATTRIBUTE_KEY: &str = "sync.correspondence";

#[derive(Default)]
struct State {
    loaded: bool,
    map: BiMap<String, String>,
}

/// Per-user store of `{local id, remote id}` pairs.
///
/// The table is loaded lazily from the local store's attribute table and
/// cached for the session; every mutation is written back atomically. A load
/// failure is fatal for the user's sync session — nothing is synchronized
/// without a correspondence table.
pub struct CorrespondenceStore {
    username: String,
    store: Arc<dyn LocalCalendarStore>,
    state: Mutex<State>,
}

impl CorrespondenceStore {
    pub fn new(username: impl Into<String>, store: Arc<dyn LocalCalendarStore>) -> Self {
        Self {
            username: username.into(),
            store,
            state: Mutex::new(State::default()),
        }
    }

    /// The partner identifier of `id`, regardless of which side it is on.
    pub async fn lookup(&self, id: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(lookup_either(&state.map, id).map(str::to_string))
    }

    /// Links a local and a remote identifier.
    ///
    /// Linking an already-linked pair is a no-op; linking either side to a
    /// new partner replaces the old pair entirely.
    pub async fn link(&self, local_id: &str, remote_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        if state.map.get_by_left(local_id).map(String::as_str) == Some(remote_id) {
            return Ok(());
        }
        state.map.insert(local_id.to_string(), remote_id.to_string());
        self.save(&state.map).await
    }

    /// Removes the pair `id` belongs to, both halves. A no-op when `id` is
    /// not linked.
    pub async fn unlink(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        let removed = state
            .map
            .remove_by_left(id)
            .or_else(|| state.map.remove_by_right(id));
        match removed {
            Some((local_id, remote_id)) => {
                debug!(%local_id, %remote_id, "correspondence removed");
                self.save(&state.map).await
            }
            None => Ok(()),
        }
    }

    /// Number of linked pairs.
    pub async fn len(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(state.map.len())
    }

    /// Snapshot of all pairs as `(local id, remote id)`.
    pub async fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(state
            .map
            .iter()
            .map(|(l, r)| (l.clone(), r.clone()))
            .collect())
    }

    async fn ensure_loaded(&self, state: &mut State) -> Result<()> {
        if state.loaded {
            return Ok(());
        }
        let blob = self
            .store
            .attribute(&self.username, ATTRIBUTE_KEY)
            .await
            .map_err(|e| SyncError::Correspondence {
                user: self.username.clone(),
                reason: e.to_string(),
            })?;
        state.map = match blob {
            Some(blob) => parse_flat(&blob).map_err(|reason| SyncError::Correspondence {
                user: self.username.clone(),
                reason,
            })?,
            None => BiMap::new(),
        };
        state.loaded = true;
        debug!(
            user = %self.username,
            pairs = state.map.len(),
            "correspondence table loaded"
        );
        Ok(())
    }

    async fn save(&self, map: &BiMap<String, String>) -> Result<()> {
        let blob = serialize_flat(map);
        self.store
            .set_attribute(&self.username, ATTRIBUTE_KEY, &blob)
            .await
    }
}

fn lookup_either<'a>(map: &'a BiMap<String, String>, id: &str) -> Option<&'a str> {
    map.get_by_left(id)
        .or_else(|| map.get_by_right(id))
        .map(String::as_str)
}

/// Serializes the table as a flat key/value property set: every key is a
/// local or remote identifier and its value is the partner identifier, so
/// both directions are present. The flat shape round-trips exactly.
fn serialize_flat(map: &BiMap<String, String>) -> String {
    let mut flat = BTreeMap::new();
    for (local_id, remote_id) in map.iter() {
        flat.insert(local_id.as_str(), remote_id.as_str());
        flat.insert(remote_id.as_str(), local_id.as_str());
    }
    // BTreeMap keys are ordered, so serialization is deterministic.
    serde_json::to_string(&flat).unwrap_or_else(|_| "{}".to_string())
}

fn parse_flat(blob: &str) -> std::result::Result<BiMap<String, String>, String> {
    let flat: BTreeMap<String, String> =
        serde_json::from_str(blob).map_err(|e| format!("malformed correspondence blob: {e}"))?;
    let mut map = BiMap::new();
    for (key, value) in flat {
        if map.contains_left(&key) || map.contains_right(&key) {
            continue;
        }
        map.insert(key, value);
    }
    Ok(map)
}
