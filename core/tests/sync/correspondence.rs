// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Correspondence-table properties over the persisted representation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use excal_core::{CorrespondenceStore, LocalCalendarStore, SyncError};
use excal_ews::FolderId;

use crate::common::fixtures::{USER, master_appointment, single_appointment, utc};
use crate::common::memory_ews::ROOT_FOLDER;
use crate::common::memory_store::MemoryLocalStore;
use crate::sync::harness;

#[tokio::test]
async fn every_entry_is_a_bijection() {
    let h = harness();
    let folder = FolderId::from(ROOT_FOLDER);
    let modified = Utc::now() - Duration::minutes(10);
    h.client.put_appointment(single_appointment(
        "item-a",
        &folder,
        "A",
        utc(2030, 1, 10, 9, 0),
        modified,
    ));
    h.client.put_appointment(master_appointment(
        "item-b",
        &folder,
        "B",
        utc(2030, 1, 5, 9, 0),
        5,
        modified,
    ));
    h.orchestrator.full_pass().await.unwrap();

    let correspondence = h.correspondence();
    let entries = correspondence.entries().await.unwrap();
    assert!(!entries.is_empty());
    for (local_id, remote_id) in entries {
        assert_eq!(
            correspondence.lookup(&local_id).await.unwrap().as_deref(),
            Some(remote_id.as_str())
        );
        assert_eq!(
            correspondence.lookup(&remote_id).await.unwrap().as_deref(),
            Some(local_id.as_str())
        );
    }
}

#[tokio::test]
async fn persisted_table_round_trips_exactly() {
    let h = harness();
    let folder = FolderId::from(ROOT_FOLDER);
    h.client.put_appointment(single_appointment(
        "item-a",
        &folder,
        "A",
        utc(2030, 1, 10, 9, 0),
        Utc::now() - Duration::minutes(10),
    ));
    h.orchestrator.full_pass().await.unwrap();

    let first: BTreeSet<(String, String)> = h
        .correspondence()
        .entries()
        .await
        .unwrap()
        .into_iter()
        .collect();

    // Force a save cycle through a second, independently loaded view.
    let second_view = h.correspondence();
    second_view.link("extra-local", "extra-remote").await.unwrap();
    second_view.unlink("extra-local").await.unwrap();

    let third: BTreeSet<(String, String)> = h
        .correspondence()
        .entries()
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(first, third);
}

#[tokio::test]
async fn linking_is_idempotent_and_replacement_is_total() {
    let store = Arc::new(MemoryLocalStore::new());
    let store_dyn: Arc<dyn LocalCalendarStore> = store;
    let correspondence = CorrespondenceStore::new(USER, store_dyn);

    correspondence.link("local-1", "remote-1").await.unwrap();
    correspondence.link("local-1", "remote-1").await.unwrap();
    assert_eq!(correspondence.len().await.unwrap(), 1);

    correspondence.link("local-1", "remote-2").await.unwrap();
    assert_eq!(correspondence.len().await.unwrap(), 1);
    assert_eq!(correspondence.lookup("remote-1").await.unwrap(), None);
    assert_eq!(
        correspondence.lookup("local-1").await.unwrap().as_deref(),
        Some("remote-2")
    );

    correspondence.unlink("remote-2").await.unwrap();
    assert_eq!(correspondence.len().await.unwrap(), 0);
    assert_eq!(correspondence.lookup("local-1").await.unwrap(), None);
    // Unlinking an unknown id is a no-op.
    correspondence.unlink("ghost").await.unwrap();
}

#[tokio::test]
async fn unreadable_table_is_fatal_for_the_session() {
    let h = harness();
    h.store
        .set_attribute_raw(USER, "sync.correspondence", "not a property set");

    let result = h.orchestrator.full_pass().await;
    assert!(matches!(result, Err(SyncError::Correspondence { .. })));
}
