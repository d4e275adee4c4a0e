// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Recurring-series exception handling: matching by recurrence identifier,
//! stale-exception pruning, and outbound occurrence binding.

use chrono::{Duration, Utc};
use excal_core::datetime::recurrence_id;
use excal_ews::FolderId;

use crate::common::fixtures::{USER, exception_override, master_appointment, utc};
use crate::common::memory_ews::ROOT_FOLDER;
use crate::sync::harness;

#[tokio::test]
async fn reordered_occurrence_list_updates_the_same_local_records() {
    let h = harness();
    let folder = FolderId::from(ROOT_FOLDER);
    let modified = Utc::now() - Duration::minutes(10);

    let master = master_appointment(
        "item-master",
        &folder,
        "Standup",
        utc(2030, 1, 5, 9, 0),
        10,
        modified,
    );
    h.client.put_appointment(master.clone());
    let first = exception_override(&master, 2, "Standup (room A)", utc(2030, 1, 6, 11, 0), modified);
    let second =
        exception_override(&master, 5, "Standup (room B)", utc(2030, 1, 9, 15, 0), modified);
    h.client
        .set_modified_occurrences(&master.id, vec![first.clone(), second.clone()]);
    h.orchestrator.full_pass().await.unwrap();

    let id_for = |summary: &str| h.store.event_by_summary(USER, summary).unwrap().id;
    let first_local = id_for("Standup (room A)");
    let second_local = id_for("Standup (room B)");

    // The server returns the occurrences in the opposite order, with one of
    // them edited.
    let edit = Utc::now() + Duration::seconds(30);
    let mut second_edited = second.clone();
    second_edited.appointment.subject = "Standup (room C)".to_string();
    second_edited.appointment.last_modified = edit;
    h.client
        .set_modified_occurrences(&master.id, vec![second_edited, first.clone()]);
    h.client.mutate_appointment(&master.id, |a| a.last_modified = edit);

    h.orchestrator.incremental_pass(None).await.unwrap();

    // Matching is by recurrence id, so the edit landed on the record that
    // already represented occurrence five.
    assert_eq!(id_for("Standup (room C)"), second_local);
    assert_eq!(id_for("Standup (room A)"), first_local);
    assert_eq!(h.store.event_count(USER), 3);
}

#[tokio::test]
async fn reverted_occurrence_prunes_the_stale_local_exception() {
    let h = harness();
    let folder = FolderId::from(ROOT_FOLDER);
    let modified = Utc::now() - Duration::minutes(10);

    let master = master_appointment(
        "item-master",
        &folder,
        "Standup",
        utc(2030, 1, 5, 9, 0),
        10,
        modified,
    );
    h.client.put_appointment(master.clone());
    h.client.set_modified_occurrences(
        &master.id,
        vec![exception_override(
            &master,
            3,
            "Standup (moved)",
            utc(2030, 1, 7, 14, 0),
            modified,
        )],
    );
    h.orchestrator.full_pass().await.unwrap();
    assert_eq!(h.store.event_count(USER), 2);

    // The user restored the occurrence to the series pattern.
    let edit = Utc::now() + Duration::seconds(30);
    h.client.set_modified_occurrences(&master.id, Vec::new());
    h.client.mutate_appointment(&master.id, |a| a.last_modified = edit);

    h.orchestrator.incremental_pass(None).await.unwrap();

    assert_eq!(h.store.event_count(USER), 1);
    assert!(h.store.event_by_summary(USER, "Standup (moved)").is_none());
    // Master and calendar mappings survive, the exception entry is gone.
    assert_eq!(h.correspondence().len().await.unwrap(), 2);
}

#[tokio::test]
async fn new_local_exception_is_pushed_through_occurrence_binding() {
    let h = harness();
    let folder = FolderId::from(ROOT_FOLDER);
    let modified = Utc::now() - Duration::minutes(10);

    let master = master_appointment(
        "item-master",
        &folder,
        "Standup",
        utc(2030, 1, 5, 9, 0),
        10,
        modified,
    );
    h.client.put_appointment(master.clone());
    h.orchestrator.full_pass().await.unwrap();

    let master_event = h.store.event_by_summary(USER, "Standup").unwrap();

    // The user moved the third occurrence in the local calendar.
    let occurrence_start = utc(2030, 1, 7, 9, 0);
    let mut exception = excal_core::CalendarEvent::new(
        "local-exception".to_string(),
        master_event.calendar_id.clone(),
    );
    exception.summary = "Standup (moved locally)".to_string();
    exception.start = utc(2030, 1, 7, 15, 0);
    exception.end = utc(2030, 1, 7, 16, 0);
    exception.last_modified = Utc::now() + Duration::seconds(30);
    exception.recurrence_id = Some(recurrence_id(occurrence_start));
    exception.master_id = Some(master_event.id.clone());
    h.store.insert_event(USER, exception);

    let summary = h.orchestrator.incremental_pass(None).await.unwrap();

    assert_eq!(summary.pushed, 1);
    let pushed = h
        .client
        .occurrence_override(&master.id, 3)
        .expect("the third occurrence should have become an exception");
    assert_eq!(pushed.appointment.subject, "Standup (moved locally)");
    assert_eq!(
        h.correspondence()
            .lookup("local-exception")
            .await
            .unwrap()
            .as_deref(),
        Some(pushed.appointment.id.as_str())
    );
}

#[tokio::test]
async fn local_exception_without_remote_occurrence_is_deleted() {
    let h = harness();
    let folder = FolderId::from(ROOT_FOLDER);
    let modified = Utc::now() - Duration::minutes(10);

    let master = master_appointment(
        "item-master",
        &folder,
        "Standup",
        utc(2030, 1, 5, 9, 0),
        10,
        modified,
    );
    h.client.put_appointment(master.clone());
    h.orchestrator.full_pass().await.unwrap();

    let master_event = h.store.event_by_summary(USER, "Standup").unwrap();

    // An exception pointing far past the end of the ten-occurrence series.
    let mut exception = excal_core::CalendarEvent::new(
        "local-orphan".to_string(),
        master_event.calendar_id.clone(),
    );
    exception.summary = "Standup (impossible)".to_string();
    exception.start = utc(2030, 3, 1, 9, 0);
    exception.end = utc(2030, 3, 1, 10, 0);
    exception.last_modified = Utc::now() + Duration::seconds(30);
    exception.recurrence_id = Some(recurrence_id(utc(2030, 3, 1, 9, 0)));
    exception.master_id = Some(master_event.id.clone());
    h.store.insert_event(USER, exception);

    let summary = h.orchestrator.incremental_pass(None).await.unwrap();

    assert_eq!(summary.deleted_local, 1);
    assert!(h.store.event_by_summary(USER, "Standup (impossible)").is_none());
}
