// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Pull-subscription notification types.
//!
//! A subscription watches a set of folders; polling it yields a batch of
//! folder-level and item-level change events accumulated since the previous
//! poll.

use std::fmt;
use std::ops::Deref;

use crate::types::{FolderId, ItemId};

/// Server-side handle of a pull subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Creates a new `SubscriptionId` from a string.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for SubscriptionId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SubscriptionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of change reported by the subscription feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RemoteEventType {
    /// The object was created.
    Created,
    /// The object was modified.
    Modified,
    /// The object was deleted.
    Deleted,
    /// The object was moved to another folder.
    Moved,
    /// Only the free/busy state changed.
    FreeBusyChanged,
}

/// A folder-level change event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FolderChange {
    /// The affected folder.
    pub folder_id: FolderId,
    /// What happened to it.
    pub event_type: RemoteEventType,
}

/// An item-level change event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ItemChange {
    /// The affected item.
    pub item_id: ItemId,
    /// The folder the item lives in.
    pub parent_folder_id: FolderId,
    /// What happened to it.
    pub event_type: RemoteEventType,
}

/// One poll's worth of accumulated change events.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NotificationBatch {
    /// Folder-level events, to be reconciled before item-level events.
    pub folder_changes: Vec<FolderChange>,
    /// Item-level events.
    pub item_changes: Vec<ItemChange>,
}

impl NotificationBatch {
    /// Returns `true` when the batch carries no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folder_changes.is_empty() && self.item_changes.is_empty()
    }
}
