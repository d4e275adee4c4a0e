// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Bidirectional synchronization engine between a local calendar store and
//! an Exchange-style groupware service.
//!
//! Neither store is authoritative: remote and local changes are reconciled
//! with last-write-wins conflict resolution, a persistent correspondence
//! table of id pairs, recurring-event exception handling, and
//! watermark-bounded incremental scans. The two stores themselves stay
//! behind the [`LocalCalendarStore`] and [`excal_ews::EwsClient`] traits.

pub mod convert;
pub mod datetime;

mod config;
mod correspondence;
mod error;
mod event;
mod feed;
mod local;
mod registry;
mod remote;
mod store;
mod sync;
mod watermark;

pub use crate::config::SyncConfig;
pub use crate::correspondence::CorrespondenceStore;
pub use crate::error::{Result, SyncError};
pub use crate::event::{
    Attachment, Availability, CalendarEvent, EventCategory, LocalCalendar, Priority, RepeatEnd,
    RepeatKind, RepeatRule,
};
pub use crate::feed::SyncEngine;
pub use crate::local::LocalStoreAdapter;
pub use crate::registry::{SessionHandle, SessionRegistry, SessionState};
pub use crate::remote::{PushOutcome, RemoteStoreAdapter};
pub use crate::store::LocalCalendarStore;
pub use crate::sync::{Orchestrator, PassSummary};
pub use crate::watermark::Watermarks;
