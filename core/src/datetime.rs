// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Date/time helpers shared by the converter and the orchestrator.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// NOTE: Recurrence identifiers are persisted and exchanged between stores,
/// so the format must stay stable across runs and versions.
pub const RECURRENCE_ID_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Formats the recurrence identifier of an occurrence from its original
/// start, anchored to UTC.
#[must_use]
pub fn recurrence_id(original_start: DateTime<Utc>) -> String {
    original_start.format(RECURRENCE_ID_FORMAT).to_string()
}

/// Parses a recurrence identifier back into its UTC start.
#[must_use]
pub fn parse_recurrence_id(id: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(id, RECURRENCE_ID_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub const fn start_of_day_naive() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 0, 0).expect("00:00:00 must exist in NaiveTime")
}

pub const fn end_of_day_naive() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).expect("23:59:59 must exist in NaiveTime")
}

/// Midnight of `date` in `tz`, as a UTC instant.
#[must_use]
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    from_civil(tz, NaiveDateTime::new(date, start_of_day_naive()))
}

/// 23:59:59 of `date` in `tz`, as a UTC instant.
#[must_use]
pub fn end_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    from_civil(tz, NaiveDateTime::new(date, end_of_day_naive()))
}

/// Whether two instants fall on the same civil date in `tz`.
#[must_use]
pub fn is_same_civil_date(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    a.with_timezone(&tz).date_naive() == b.with_timezone(&tz).date_naive()
}

/// The watermark adjusted for the remote query: apply the configured UTC
/// offset and skip one second past the watermark itself (the comparison on
/// the service side is strictly-greater).
#[must_use]
pub fn adjusted_since(watermark: DateTime<Utc>, utc_offset_minutes: i32) -> DateTime<Utc> {
    watermark + Duration::minutes(i64::from(utc_offset_minutes)) + Duration::seconds(1)
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Rebuilds an instant from milliseconds since the Unix epoch.
#[must_use]
pub fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// Resolves a civil datetime in `tz`, handling local-time ambiguities:
/// `Ambiguous` takes the earlier instant, a nonexistent local time (DST gap)
/// falls back to the UTC reading.
fn from_civil(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(a, b) => {
            let earlier = if a <= b { a } else { b };
            earlier.with_timezone(&Utc)
        }
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}
