// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, NaiveDate, Utc};

/// Opaque identifier of an item (appointment) on the remote service.
///
/// Item identifiers are assigned by the server and must be treated as opaque
/// strings; the engine never derives meaning from their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new `ItemId` from a string.
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

impl Deref for ItemId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque identifier of a folder on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FolderId(String);

impl FolderId {
    /// Creates a new `FolderId` from a string.
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

impl Deref for FolderId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for FolderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FolderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for FolderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A calendar folder on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteFolder {
    /// The folder identifier.
    pub id: FolderId,
    /// The parent folder, `None` for the calendar root.
    pub parent_id: Option<FolderId>,
    /// Display name shown to the user.
    pub display_name: String,
}

impl RemoteFolder {
    /// Creates a new `RemoteFolder`.
    #[must_use]
    pub const fn new(id: FolderId, parent_id: Option<FolderId>, display_name: String) -> Self {
        Self {
            id,
            parent_id,
            display_name,
        }
    }
}

/// How an appointment relates to a recurring series.
///
/// `Occurrence` and `ExceptionOccurrence` describe instances that are only
/// reachable through their master's modified-occurrence list; they are never
/// persisted independently by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AppointmentKind {
    /// A plain, non-recurring appointment.
    Single,
    /// The root record of a recurring series.
    RecurringMaster,
    /// A generated instance of a recurring series.
    Occurrence,
    /// An instance of a recurring series whose fields diverge from the
    /// series pattern.
    ExceptionOccurrence,
}

/// Free/busy state advertised by an appointment.
///
/// The wire representation is the legacy numeric state code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FreeBusyStatus {
    /// The slot is free.
    Free,
    /// Tentatively occupied.
    Tentative,
    /// The slot is busy.
    Busy,
    /// The user is out of office.
    OutOfOffice,
}

impl FreeBusyStatus {
    /// The legacy numeric state code for this status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Free => 1,
            Self::Tentative => 2,
            Self::Busy => 3,
            Self::OutOfOffice => 4,
        }
    }

    /// Parses a legacy numeric state code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Free),
            2 => Some(Self::Tentative),
            3 => Some(Self::Busy),
            4 => Some(Self::OutOfOffice),
            _ => None,
        }
    }
}

/// Importance assigned to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Importance {
    /// Low importance, rank 1.
    Low,
    /// Normal importance, rank 2.
    Normal,
    /// High importance, rank 3.
    High,
}

impl Importance {
    /// The 1-based importance rank (Low = 1, Normal = 2, High = 3).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
        }
    }

    /// Builds an `Importance` from its 1-based rank.
    #[must_use]
    pub const fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(Self::Low),
            2 => Some(Self::Normal),
            3 => Some(Self::High),
            _ => None,
        }
    }
}

/// Sensitivity of an appointment. Anything other than `Normal` marks the
/// appointment as private on the local side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Sensitivity {
    /// Default visibility.
    #[default]
    Normal,
    /// Personal appointment.
    Personal,
    /// Private appointment.
    Private,
    /// Confidential appointment.
    Confidential,
}

/// Recurrence pattern kind of a recurring master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RecurrenceKind {
    /// Repeats every `interval` days.
    Daily,
    /// Repeats every `interval` weeks.
    Weekly,
    /// Repeats every `interval` months.
    Monthly,
    /// Repeats every `interval` years.
    Yearly,
}

/// End condition of a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RecurrenceEnd {
    /// The series is open-ended.
    Never,
    /// The series ends on the given date (inclusive).
    Until(NaiveDate),
    /// The series ends after the given number of occurrences.
    Count(u32),
}

/// Recurrence pattern of a recurring master appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecurrencePattern {
    /// The pattern kind.
    pub kind: RecurrenceKind,
    /// The repetition interval in units of `kind`, at least 1.
    pub interval: u32,
    /// The date of the first occurrence.
    pub start_date: NaiveDate,
    /// The end condition.
    pub end: RecurrenceEnd,
}

impl RecurrencePattern {
    /// The series end date, if the pattern ends by date.
    #[must_use]
    pub const fn end_date(&self) -> Option<NaiveDate> {
        match self.end {
            RecurrenceEnd::Until(date) => Some(date),
            RecurrenceEnd::Never | RecurrenceEnd::Count(_) => None,
        }
    }
}

/// An attendee or resource attached to an appointment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attendee {
    /// Display name, if the server provided one.
    pub name: Option<String>,
    /// Mail address, if the server provided one.
    pub email: Option<String>,
}

/// A binary attachment carried by an appointment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteAttachment {
    /// File name of the attachment.
    pub name: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw attachment bytes.
    pub content: Vec<u8>,
    /// Last modification time of the attachment, if known.
    pub last_modified: Option<DateTime<Utc>>,
}

/// An appointment as observed on the remote service.
///
/// The same shape is used for reads and writes; on write the server ignores
/// `id`, `kind` and `last_modified` and assigns its own values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RemoteAppointment {
    /// The item identifier.
    pub id: ItemId,
    /// The owning calendar folder.
    pub parent_folder_id: FolderId,
    /// Relation to a recurring series.
    pub kind: AppointmentKind,
    /// Subject line.
    pub subject: String,
    /// Free-text body.
    pub body: String,
    /// Location string.
    pub location: Option<String>,
    /// Start of the appointment, stored in UTC by the service.
    pub start: DateTime<Utc>,
    /// End of the appointment, stored in UTC by the service.
    pub end: DateTime<Utc>,
    /// Whether the appointment spans whole days.
    pub all_day: bool,
    /// Server-side last modification time, in UTC.
    pub last_modified: DateTime<Utc>,
    /// Free/busy state.
    pub free_busy: Option<FreeBusyStatus>,
    /// Importance, if set.
    pub importance: Option<Importance>,
    /// Sensitivity of the appointment.
    pub sensitivity: Sensitivity,
    /// Category labels, first one wins on the local side.
    pub categories: Vec<String>,
    /// Required attendees.
    pub required_attendees: Vec<Attendee>,
    /// Optional attendees.
    pub optional_attendees: Vec<Attendee>,
    /// Booked resources (rooms, equipment).
    pub resources: Vec<Attendee>,
    /// Binary attachments.
    pub attachments: Vec<RemoteAttachment>,
    /// Recurrence pattern, present on recurring masters.
    pub recurrence: Option<RecurrencePattern>,
}

/// A modified occurrence of a recurring master, as listed by the server.
///
/// Carries enough to bind the full occurrence item and to derive the
/// occurrence's recurrence identifier from its original start.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OccurrenceInfo {
    /// Item identifier of the exception occurrence.
    pub item_id: ItemId,
    /// The start the occurrence originally had in the series pattern.
    pub original_start: DateTime<Utc>,
}
