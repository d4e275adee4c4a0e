// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The contract against the local calendar store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::event::{CalendarEvent, EventCategory, LocalCalendar};

/// Operations the engine needs from the local calendar store.
///
/// The store's persistence engine is not part of the engine; any backend
/// exposing calendar/event CRUD and a per-user string attribute table can
/// implement this. All reads and writes are scoped by username.
#[async_trait]
pub trait LocalCalendarStore: Send + Sync {
    /// Loads a calendar by id, `None` when absent.
    async fn calendar(&self, username: &str, calendar_id: &str) -> Result<Option<LocalCalendar>>;

    /// Lists all calendars of a user.
    async fn calendars(&self, username: &str) -> Result<Vec<LocalCalendar>>;

    /// Creates or updates a calendar.
    async fn save_calendar(
        &self,
        username: &str,
        calendar: &LocalCalendar,
        is_new: bool,
    ) -> Result<()>;

    /// Removes a calendar together with its events. Returns the removed
    /// calendar, `None` when it did not exist.
    async fn remove_calendar(
        &self,
        username: &str,
        calendar_id: &str,
    ) -> Result<Option<LocalCalendar>>;

    /// Loads an event by id, `None` when absent.
    async fn event(&self, username: &str, event_id: &str) -> Result<Option<CalendarEvent>>;

    /// Creates or updates an event in a calendar.
    async fn save_event(
        &self,
        username: &str,
        calendar_id: &str,
        event: &CalendarEvent,
        is_new: bool,
    ) -> Result<()>;

    /// Removes a single event record.
    async fn remove_event(&self, username: &str, calendar_id: &str, event_id: &str) -> Result<()>;

    /// Removes one occurrence instance of a series without touching the
    /// master or other instances.
    async fn remove_occurrence_instance(&self, username: &str, event: &CalendarEvent)
    -> Result<()>;

    /// Removes a recurring series: the master and every exception child.
    async fn remove_recurrence_series(
        &self,
        username: &str,
        master: &CalendarEvent,
    ) -> Result<()>;

    /// Bulk read of all events in the given calendars, exception
    /// occurrences included.
    async fn events_by_calendars(
        &self,
        username: &str,
        calendar_ids: &[String],
    ) -> Result<Vec<CalendarEvent>>;

    /// Lists the exception occurrences belonging to a recurring master.
    async fn exception_events(
        &self,
        username: &str,
        master: &CalendarEvent,
    ) -> Result<Vec<CalendarEvent>>;

    /// Looks up an event category by name.
    async fn category_by_name(
        &self,
        username: &str,
        name: &str,
    ) -> Result<Option<EventCategory>>;

    /// Creates an event category.
    async fn save_category(&self, username: &str, category: &EventCategory) -> Result<()>;

    /// Bumps an event's last-modified time without changing its content.
    /// Used after outbound pushes so the event is not re-imported by the
    /// next inbound scan.
    async fn touch_modified(
        &self,
        username: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Reads a per-user opaque attribute.
    async fn attribute(&self, username: &str, key: &str) -> Result<Option<String>>;

    /// Writes a per-user opaque attribute.
    async fn set_attribute(&self, username: &str, key: &str, value: &str) -> Result<()>;
}
