// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Typed interface to an Exchange-style groupware calendar service (EWS).
//!
//! This crate defines the object model and the [`EwsClient`] contract the
//! synchronization engine consumes: folders, appointments, recurrence
//! patterns, pull-subscription notifications and the error taxonomy.
//! Transport and SOAP/XML marshaling live behind the trait and are not part
//! of this crate.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(clippy::similar_names, clippy::single_match_else, clippy::match_bool)]

mod client;
mod error;
mod notifications;
mod types;

pub use crate::client::{DeleteMode, EwsClient, WellKnownFolder};
pub use crate::error::EwsError;
pub use crate::notifications::{
    FolderChange, ItemChange, NotificationBatch, RemoteEventType, SubscriptionId,
};
pub use crate::types::{
    AppointmentKind, Attendee, FolderId, FreeBusyStatus, Importance, ItemId, OccurrenceInfo,
    RecurrenceEnd, RecurrenceKind, RecurrencePattern, RemoteAppointment, RemoteAttachment,
    RemoteFolder, Sensitivity,
};
