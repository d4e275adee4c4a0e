// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Test data factories for the synchronization suites.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use excal_core::{CalendarEvent, SyncConfig};
use excal_ews::{
    AppointmentKind, FolderId, FreeBusyStatus, ItemId, OccurrenceInfo, RecurrenceEnd,
    RecurrenceKind, RecurrencePattern, RemoteAppointment, Sensitivity,
};

use super::memory_ews::OccurrenceOverride;

/// The user every suite synchronizes for.
pub const USER: &str = "jdoe";

pub fn test_config() -> SyncConfig {
    SyncConfig {
        server_url: "https://mail.example.com/EWS/Exchange.asmx".into(),
        domain: "example.com".into(),
        poll_interval_secs: 1,
        first_sync_delay_secs: 0,
        ..SyncConfig::default()
    }
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap()
}

/// A plain appointment in the given folder.
pub fn single_appointment(
    id: &str,
    folder: &FolderId,
    subject: &str,
    start: DateTime<Utc>,
    last_modified: DateTime<Utc>,
) -> RemoteAppointment {
    RemoteAppointment {
        id: ItemId::from(id),
        parent_folder_id: folder.clone(),
        kind: AppointmentKind::Single,
        subject: subject.to_string(),
        body: format!("{subject} body"),
        location: None,
        start,
        end: start + Duration::hours(1),
        all_day: false,
        last_modified,
        free_busy: Some(FreeBusyStatus::Busy),
        importance: None,
        sensitivity: Sensitivity::Normal,
        categories: Vec::new(),
        required_attendees: Vec::new(),
        optional_attendees: Vec::new(),
        resources: Vec::new(),
        attachments: Vec::new(),
        recurrence: None,
    }
}

/// A recurring master with a daily pattern of `count` occurrences.
pub fn master_appointment(
    id: &str,
    folder: &FolderId,
    subject: &str,
    start: DateTime<Utc>,
    count: u32,
    last_modified: DateTime<Utc>,
) -> RemoteAppointment {
    let mut appointment = single_appointment(id, folder, subject, start, last_modified);
    appointment.kind = AppointmentKind::RecurringMaster;
    appointment.recurrence = Some(RecurrencePattern {
        kind: RecurrenceKind::Daily,
        interval: 1,
        start_date: start.date_naive(),
        end: RecurrenceEnd::Count(count),
    });
    appointment
}

/// A modified occurrence of `master` at the given 1-based series index.
pub fn exception_override(
    master: &RemoteAppointment,
    index: u32,
    subject: &str,
    actual_start: DateTime<Utc>,
    last_modified: DateTime<Utc>,
) -> OccurrenceOverride {
    let original_start = master.start + Duration::days(i64::from(index) - 1);
    let mut appointment = single_appointment(
        &format!("{}-exc-{index}", master.id),
        &master.parent_folder_id,
        subject,
        actual_start,
        last_modified,
    );
    appointment.kind = AppointmentKind::ExceptionOccurrence;
    OccurrenceOverride {
        index,
        info: OccurrenceInfo {
            item_id: appointment.id.clone(),
            original_start,
        },
        appointment,
    }
}

/// A locally created event, not yet known to the remote service.
pub fn local_event(
    id: &str,
    calendar_id: &str,
    summary: &str,
    start: DateTime<Utc>,
    last_modified: DateTime<Utc>,
) -> CalendarEvent {
    let mut event = CalendarEvent::new(id.to_string(), calendar_id.to_string());
    event.summary = summary.to_string();
    event.description = format!("{summary} body");
    event.start = start;
    event.end = start + Duration::hours(1);
    event.last_modified = last_modified;
    event
}
