// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Stateless mapping between the remote appointment schema and the local
//! event schema.
//!
//! Everything here is a pure function; category records are allocated by the
//! local store adapter, not here.

use chrono::{DateTime, Days, Timelike, Utc};
use chrono_tz::Tz;
use excal_ews::{
    Attendee, FolderId, FreeBusyStatus, Importance, ItemId, OccurrenceInfo, RecurrenceEnd,
    RecurrenceKind, RecurrencePattern, RemoteAppointment, RemoteAttachment, Sensitivity,
};
use sha2::{Digest, Sha256};

use crate::datetime::{end_of_day, recurrence_id, start_of_day};
use crate::event::{
    Attachment, Availability, CalendarEvent, Priority, RepeatEnd, RepeatKind, RepeatRule,
};

/// Prefix of local event ids derived from remote item ids.
pub const DERIVED_EVENT_PREFIX: &str = "excal-evt-";

/// Prefix of local calendar ids derived from remote folder ids.
pub const DERIVED_CALENDAR_PREFIX: &str = "excal-cal-";

/// Prefix of local category ids allocated for remote category labels.
pub const DERIVED_CATEGORY_PREFIX: &str = "excal-cat-";

/// Tag prepended to the display name of calendars mirrored from the remote
/// service.
pub const REMOTE_CALENDAR_TAG: &str = "EXCH";

/// Remote all-day events are stored as UTC instants of a local midnight; a
/// start at or after this UTC hour belongs to the following calendar day.
const ALL_DAY_SHIFT_HOUR: u32 = 22;

fn stable_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

/// Deterministic local event id for a remote item.
///
/// Only a bootstrap/legacy fallback: once a correspondence entry exists it
/// is authoritative over this derivation.
#[must_use]
pub fn derived_event_id(item_id: &ItemId) -> String {
    format!("{DERIVED_EVENT_PREFIX}{}", stable_digest(item_id.as_str()))
}

/// Deterministic local calendar id for a remote folder.
#[must_use]
pub fn derived_calendar_id(folder_id: &FolderId) -> String {
    format!(
        "{DERIVED_CALENDAR_PREFIX}{}",
        stable_digest(folder_id.as_str())
    )
}

/// Deterministic local category id for a remote category label.
#[must_use]
pub fn derived_category_id(name: &str) -> String {
    format!("{DERIVED_CATEGORY_PREFIX}{}", stable_digest(name))
}

/// Whether a local event id was derived from a remote item id, i.e. the
/// event originated on the remote service.
#[must_use]
pub fn is_derived_event_id(id: &str) -> bool {
    id.starts_with(DERIVED_EVENT_PREFIX)
}

/// Whether a local calendar id was derived from a remote folder id.
#[must_use]
pub fn is_derived_calendar_id(id: &str) -> bool {
    id.starts_with(DERIVED_CALENDAR_PREFIX)
}

/// Display name of the local mirror of a remote folder.
#[must_use]
pub fn calendar_display_name(folder_name: &str) -> String {
    format!("{REMOTE_CALENDAR_TAG}-{folder_name}")
}

/// Maps the remote free/busy state to the local availability.
///
/// Tentative has no local counterpart and leaves the availability unset.
#[must_use]
pub fn availability_from_state(state: Option<FreeBusyStatus>) -> Option<Availability> {
    match state? {
        FreeBusyStatus::Free => Some(Availability::Available),
        FreeBusyStatus::Busy => Some(Availability::Busy),
        FreeBusyStatus::OutOfOffice => Some(Availability::Outside),
        FreeBusyStatus::Tentative => None,
    }
}

#[must_use]
pub fn state_from_availability(availability: Option<Availability>) -> Option<FreeBusyStatus> {
    match availability? {
        Availability::Available => Some(FreeBusyStatus::Free),
        Availability::Busy => Some(FreeBusyStatus::Busy),
        Availability::Outside => Some(FreeBusyStatus::OutOfOffice),
    }
}

/// Maps importance to priority. The scales run in opposite directions:
/// importance rank 1/2/3 becomes priority 3/2/1.
#[must_use]
pub fn priority_from_importance(importance: Option<Importance>) -> Priority {
    match importance {
        Some(i) => Priority::from_value(4 - i.rank()),
        None => Priority::None,
    }
}

#[must_use]
pub fn importance_from_priority(priority: Priority) -> Option<Importance> {
    match priority {
        Priority::None => None,
        _ => Importance::from_rank(4 - priority.value()),
    }
}

/// The participant list of an appointment: required attendees, optional
/// attendees, then resources, keeping only named entries.
#[must_use]
pub fn participants(appointment: &RemoteAppointment) -> Vec<String> {
    appointment
        .required_attendees
        .iter()
        .chain(&appointment.optional_attendees)
        .chain(&appointment.resources)
        .filter_map(|a| a.name.clone())
        .collect()
}

/// Copies attachments verbatim, skipping zero-length ones.
#[must_use]
pub fn attachments_from_remote(attachments: &[RemoteAttachment]) -> Vec<Attachment> {
    attachments
        .iter()
        .filter(|a| !a.content.is_empty())
        .map(|a| Attachment {
            name: a.name.clone(),
            mime_type: a.content_type.clone(),
            content: a.content.clone(),
            last_modified: a.last_modified,
        })
        .collect()
}

fn attachments_to_remote(attachments: &[Attachment]) -> Vec<RemoteAttachment> {
    attachments
        .iter()
        .map(|a| RemoteAttachment {
            name: a.name.clone(),
            content_type: a.mime_type.clone(),
            content: a.content.clone(),
            last_modified: a.last_modified,
        })
        .collect()
}

/// The local time range of an appointment.
///
/// All-day appointments are snapped to local midnight through end-of-day in
/// the user's calendar time zone. A remote start hour of 22:00 UTC or later
/// means the UTC instant encodes a local midnight of the *following* day.
#[must_use]
pub fn normalized_times(
    appointment: &RemoteAppointment,
    tz: Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    if !appointment.all_day {
        return (appointment.start, appointment.end);
    }
    let mut start_date = appointment.start.date_naive();
    if appointment.start.hour() >= ALL_DAY_SHIFT_HOUR {
        start_date = start_date + Days::new(1);
    }
    let end_date = appointment.end.with_timezone(&tz).date_naive();
    (start_of_day(start_date, tz), end_of_day(end_date, tz))
}

/// Applies the non-recurrence fields of an appointment to a local event.
///
/// Identity (`id`, `calendar_id`) and the repeat rule are left untouched;
/// the caller owns those.
pub fn apply_appointment(event: &mut CalendarEvent, appointment: &RemoteAppointment, tz: Tz) {
    let (start, end) = normalized_times(appointment, tz);
    event.summary = appointment.subject.clone();
    event.description = appointment.body.clone();
    event.location = appointment.location.clone();
    event.start = start;
    event.end = end;
    event.last_modified = appointment.last_modified;
    event.availability = availability_from_state(appointment.free_busy);
    event.priority = priority_from_importance(appointment.importance);
    event.participants = participants(appointment);
    event.private = appointment.sensitivity != Sensitivity::Normal;
    event.category_name = appointment.categories.first().cloned();
    event.attachments = attachments_from_remote(&appointment.attachments);
}

/// Maps a remote recurrence pattern to the local repeat rule.
#[must_use]
pub fn repeat_from_pattern(pattern: &RecurrencePattern) -> RepeatRule {
    let kind = match pattern.kind {
        RecurrenceKind::Daily => RepeatKind::Daily,
        RecurrenceKind::Weekly => RepeatKind::Weekly,
        RecurrenceKind::Monthly => RepeatKind::Monthly,
        RecurrenceKind::Yearly => RepeatKind::Yearly,
    };
    let end = match pattern.end {
        RecurrenceEnd::Never => RepeatEnd::Never,
        RecurrenceEnd::Until(date) => RepeatEnd::Until(date),
        RecurrenceEnd::Count(n) => RepeatEnd::Count(n),
    };
    RepeatRule {
        kind,
        interval: pattern.interval.max(1),
        end,
        excluded: Vec::new(),
    }
}

/// Maps a local repeat rule back to a remote recurrence pattern. Returns
/// `None` for non-repeating rules.
#[must_use]
pub fn pattern_from_repeat(
    rule: &RepeatRule,
    series_start: DateTime<Utc>,
    tz: Tz,
) -> Option<RecurrencePattern> {
    let kind = match rule.kind {
        RepeatKind::None => return None,
        RepeatKind::Daily => RecurrenceKind::Daily,
        RepeatKind::Weekly => RecurrenceKind::Weekly,
        RepeatKind::Monthly => RecurrenceKind::Monthly,
        RepeatKind::Yearly => RecurrenceKind::Yearly,
    };
    let end = match rule.end {
        RepeatEnd::Never => RecurrenceEnd::Never,
        RepeatEnd::Until(date) => RecurrenceEnd::Until(date),
        RepeatEnd::Count(n) => RecurrenceEnd::Count(n),
    };
    Some(RecurrencePattern {
        kind,
        interval: rule.interval.max(1),
        start_date: series_start.with_timezone(&tz).date_naive(),
        end,
    })
}

/// Whether a local event occupies whole days in the user's time zone.
#[must_use]
pub fn is_all_day_shape(event: &CalendarEvent, tz: Tz) -> bool {
    let start = event.start.with_timezone(&tz).time();
    let end = event.end.with_timezone(&tz).time();
    start.hour() == 0 && start.minute() == 0 && end.hour() == 23 && end.minute() == 59
}

/// Builds the remote write shape for a local event. The server assigns
/// `id`, `kind` and `last_modified` on save.
#[must_use]
pub fn event_to_appointment(
    event: &CalendarEvent,
    folder_id: &FolderId,
    tz: Tz,
) -> RemoteAppointment {
    let recurrence = if event.is_recurring_master() {
        pattern_from_repeat(&event.repeat, event.start, tz)
    } else {
        None
    };
    let kind = if recurrence.is_some() {
        excal_ews::AppointmentKind::RecurringMaster
    } else {
        excal_ews::AppointmentKind::Single
    };
    RemoteAppointment {
        id: ItemId::new(String::new()),
        parent_folder_id: folder_id.clone(),
        kind,
        subject: event.summary.clone(),
        body: event.description.clone(),
        location: event.location.clone(),
        start: event.start,
        end: event.end,
        all_day: is_all_day_shape(event, tz),
        last_modified: event.last_modified,
        free_busy: state_from_availability(event.availability),
        importance: importance_from_priority(event.priority),
        sensitivity: if event.private {
            Sensitivity::Private
        } else {
            Sensitivity::Normal
        },
        categories: event.category_name.iter().cloned().collect(),
        required_attendees: event
            .participants
            .iter()
            .map(|name| Attendee {
                name: Some(name.clone()),
                email: None,
            })
            .collect(),
        optional_attendees: Vec::new(),
        resources: Vec::new(),
        attachments: attachments_to_remote(&event.attachments),
        recurrence,
    }
}

/// One exception occurrence to write to the local store.
#[derive(Debug, Clone)]
pub struct ExceptionUpsert {
    /// The local event to save.
    pub event: CalendarEvent,
    /// The remote item the event corresponds to.
    pub remote_id: ItemId,
    /// Whether the event is new to the local store.
    pub is_new: bool,
    /// Last-modified time the matched local record had before conversion,
    /// for the caller's conflict guard. `None` for new events.
    pub previous_last_modified: Option<DateTime<Utc>>,
}

/// Outcome of reconciling a master's modified occurrences against the local
/// exception records.
#[derive(Debug, Clone, Default)]
pub struct ExceptionPlan {
    pub upserts: Vec<ExceptionUpsert>,
    /// Local exception records with no surviving remote occurrence.
    pub stale: Vec<CalendarEvent>,
}

/// Reconciles the modified occurrences of a recurring master with the
/// existing local exception events.
///
/// Matching is strictly by the recurrence identifier derived from each
/// occurrence's original start; the order of `occurrences` is irrelevant.
#[must_use]
pub fn plan_exceptions(
    master: &CalendarEvent,
    occurrences: &[(OccurrenceInfo, RemoteAppointment)],
    existing: Vec<CalendarEvent>,
    tz: Tz,
) -> ExceptionPlan {
    let mut remaining = existing;
    let mut plan = ExceptionPlan::default();

    for (info, appointment) in occurrences {
        let rid = recurrence_id(info.original_start);
        let matched = remaining
            .iter()
            .position(|e| e.recurrence_id.as_deref() == Some(rid.as_str()))
            .map(|i| remaining.swap_remove(i));

        let (mut event, is_new, previous_last_modified) = match matched {
            Some(existing_event) => {
                let previous = existing_event.last_modified;
                (existing_event, false, Some(previous))
            }
            None => (
                CalendarEvent::new(derived_event_id(&info.item_id), master.calendar_id.clone()),
                true,
                None,
            ),
        };
        apply_appointment(&mut event, appointment, tz);
        event.calendar_id = master.calendar_id.clone();
        event.repeat = RepeatRule::none();
        event.recurrence_id = Some(rid);
        event.master_id = Some(master.id.clone());

        plan.upserts.push(ExceptionUpsert {
            event,
            remote_id: info.item_id.clone(),
            is_new,
            previous_last_modified,
        });
    }

    plan.stale = remaining;
    plan
}
