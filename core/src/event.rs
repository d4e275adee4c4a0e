// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, Utc};

/// A calendar in the local store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LocalCalendar {
    pub id: String,
    pub name: String,
    /// Username of the owning user.
    pub owner: String,
}

/// An event category in the local store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventCategory {
    pub id: String,
    pub name: String,
}

/// Availability advertised by a local event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Availability {
    Available,
    Busy,
    Outside,
}

/// Priority of a local event: 1 is highest, 3 is lowest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    /// No priority set.
    #[default]
    None,
    /// Priority 1, highest.
    High,
    /// Priority 2.
    Normal,
    /// Priority 3, lowest.
    Low,
}

impl Priority {
    /// The numeric priority value (1..=3), 0 for none.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::None => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }

    /// Builds a priority from its numeric value.
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        match value {
            1 => Self::High,
            2 => Self::Normal,
            3 => Self::Low,
            _ => Self::None,
        }
    }
}

/// How a local event repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RepeatKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// End condition of a repeating local event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RepeatEnd {
    /// The series is open-ended.
    #[default]
    Never,
    /// The series ends on the given date (inclusive).
    Until(NaiveDate),
    /// The series ends after the given number of occurrences.
    Count(u32),
}

/// Recurrence descriptor of a local event.
///
/// Exception occurrences keep `kind` at [`RepeatKind::None`] even though
/// they belong to a series; their series membership is expressed through
/// [`CalendarEvent::recurrence_id`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepeatRule {
    pub kind: RepeatKind,
    /// Repetition interval in units of `kind`; 0 when not repeating.
    pub interval: u32,
    pub end: RepeatEnd,
    /// Recurrence identifiers of occurrences excluded from the series.
    pub excluded: Vec<String>,
}

impl RepeatRule {
    /// A rule that does not repeat.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this rule describes a repeating series.
    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.kind != RepeatKind::None
    }
}

/// A binary attachment of a local event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A calendar event in the local store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    /// The owning calendar.
    pub calendar_id: String,
    pub summary: String,
    pub description: String,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Last modification time, normalized to UTC for conflict comparison.
    pub last_modified: DateTime<Utc>,
    pub repeat: RepeatRule,
    /// Recurrence identifier, present only on exception occurrences.
    pub recurrence_id: Option<String>,
    /// Id of the series master, present only on exception occurrences.
    pub master_id: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    /// Participant names.
    pub participants: Vec<String>,
    pub private: bool,
    pub availability: Option<Availability>,
    pub priority: Priority,
    pub attachments: Vec<Attachment>,
}

impl CalendarEvent {
    /// Creates an empty event in the given calendar.
    #[must_use]
    pub fn new(id: String, calendar_id: String) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id,
            calendar_id,
            summary: String::new(),
            description: String::new(),
            location: None,
            start: epoch,
            end: epoch,
            last_modified: epoch,
            repeat: RepeatRule::none(),
            recurrence_id: None,
            master_id: None,
            category_id: None,
            category_name: None,
            participants: Vec::new(),
            private: false,
            availability: None,
            priority: Priority::None,
            attachments: Vec::new(),
        }
    }

    /// Whether this event is an exception occurrence of a series.
    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.recurrence_id.is_some()
    }

    /// Whether this event is the master record of a recurring series.
    #[must_use]
    pub fn is_recurring_master(&self) -> bool {
        self.repeat.is_repeating() && self.recurrence_id.is_none()
    }
}
