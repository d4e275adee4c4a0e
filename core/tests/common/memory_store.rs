// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory implementation of the local calendar store contract.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use excal_core::{
    CalendarEvent, EventCategory, LocalCalendar, LocalCalendarStore, Result,
};

#[derive(Default)]
struct UserData {
    calendars: BTreeMap<String, LocalCalendar>,
    events: BTreeMap<String, CalendarEvent>,
    categories: BTreeMap<String, EventCategory>,
    attributes: BTreeMap<String, String>,
}

/// A local store backed by maps, with a mutation counter so tests can
/// assert that re-running a pass writes nothing.
#[derive(Default)]
pub struct MemoryLocalStore {
    users: Mutex<BTreeMap<String, UserData>>,
    mutations: AtomicUsize,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calendar/event/category writes so far. Attribute writes
    /// (watermarks, correspondence) are not counted.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn count_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn event_count(&self, username: &str) -> usize {
        let users = self.users.lock().unwrap();
        users.get(username).map_or(0, |u| u.events.len())
    }

    pub fn calendar_count(&self, username: &str) -> usize {
        let users = self.users.lock().unwrap();
        users.get(username).map_or(0, |u| u.calendars.len())
    }

    pub fn event_by_summary(&self, username: &str, summary: &str) -> Option<CalendarEvent> {
        let users = self.users.lock().unwrap();
        users
            .get(username)?
            .events
            .values()
            .find(|e| e.summary == summary)
            .cloned()
    }

    /// Inserts an event directly, bypassing the adapter (test setup).
    pub fn insert_event(&self, username: &str, event: CalendarEvent) {
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .events
            .insert(event.id.clone(), event);
    }

    /// Inserts a calendar directly, bypassing the adapter (test setup).
    pub fn insert_calendar(&self, username: &str, calendar: LocalCalendar) {
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .calendars
            .insert(calendar.id.clone(), calendar);
    }

    /// Removes an event directly, bypassing the adapter (simulates a local
    /// deletion by the user).
    pub fn delete_event_raw(&self, username: &str, event_id: &str) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(username) {
            user.events.remove(event_id);
        }
    }

    /// Writes a watermark attribute directly (test setup).
    pub fn set_attribute_raw(&self, username: &str, key: &str, value: &str) {
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .attributes
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl LocalCalendarStore for MemoryLocalStore {
    async fn calendar(&self, username: &str, calendar_id: &str) -> Result<Option<LocalCalendar>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .and_then(|u| u.calendars.get(calendar_id).cloned()))
    }

    async fn calendars(&self, username: &str) -> Result<Vec<LocalCalendar>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .map(|u| u.calendars.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_calendar(
        &self,
        username: &str,
        calendar: &LocalCalendar,
        _is_new: bool,
    ) -> Result<()> {
        self.count_mutation();
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .calendars
            .insert(calendar.id.clone(), calendar.clone());
        Ok(())
    }

    async fn remove_calendar(
        &self,
        username: &str,
        calendar_id: &str,
    ) -> Result<Option<LocalCalendar>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.get_mut(username) else {
            return Ok(None);
        };
        let removed = user.calendars.remove(calendar_id);
        if removed.is_some() {
            self.count_mutation();
            user.events.retain(|_, e| e.calendar_id != calendar_id);
        }
        Ok(removed)
    }

    async fn event(&self, username: &str, event_id: &str) -> Result<Option<CalendarEvent>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .and_then(|u| u.events.get(event_id).cloned()))
    }

    async fn save_event(
        &self,
        username: &str,
        _calendar_id: &str,
        event: &CalendarEvent,
        _is_new: bool,
    ) -> Result<()> {
        self.count_mutation();
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .events
            .insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn remove_event(&self, username: &str, _calendar_id: &str, event_id: &str) -> Result<()> {
        self.count_mutation();
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(username) {
            user.events.remove(event_id);
        }
        Ok(())
    }

    async fn remove_occurrence_instance(
        &self,
        username: &str,
        event: &CalendarEvent,
    ) -> Result<()> {
        self.count_mutation();
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.get_mut(username) else {
            return Ok(());
        };
        user.events.remove(&event.id);
        // Record the exclusion on the series master.
        if let (Some(master_id), Some(rid)) = (&event.master_id, &event.recurrence_id) {
            if let Some(master) = user.events.get_mut(master_id) {
                if !master.repeat.excluded.contains(rid) {
                    master.repeat.excluded.push(rid.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_recurrence_series(
        &self,
        username: &str,
        master: &CalendarEvent,
    ) -> Result<()> {
        self.count_mutation();
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(username) {
            user.events
                .retain(|_, e| {
                    e.id != master.id && e.master_id.as_deref() != Some(master.id.as_str())
                });
        }
        Ok(())
    }

    async fn events_by_calendars(
        &self,
        username: &str,
        calendar_ids: &[String],
    ) -> Result<Vec<CalendarEvent>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .map(|u| {
                u.events
                    .values()
                    .filter(|e| calendar_ids.contains(&e.calendar_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn exception_events(
        &self,
        username: &str,
        master: &CalendarEvent,
    ) -> Result<Vec<CalendarEvent>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .map(|u| {
                u.events
                    .values()
                    .filter(|e| e.master_id.as_deref() == Some(master.id.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn category_by_name(
        &self,
        username: &str,
        name: &str,
    ) -> Result<Option<EventCategory>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .and_then(|u| u.categories.values().find(|c| c.name == name).cloned()))
    }

    async fn save_category(&self, username: &str, category: &EventCategory) -> Result<()> {
        self.count_mutation();
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .categories
            .insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn touch_modified(
        &self,
        username: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(event) = users
            .get_mut(username)
            .and_then(|u| u.events.get_mut(event_id))
        {
            event.last_modified = at;
        }
        Ok(())
    }

    async fn attribute(&self, username: &str, key: &str) -> Result<Option<String>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(username)
            .and_then(|u| u.attributes.get(key).cloned()))
    }

    async fn set_attribute(&self, username: &str, key: &str, value: &str) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        users
            .entry(username.to_string())
            .or_default()
            .attributes
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
