// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Change-feed task lifecycle: login, scheduled runs, subscription renewal
//! and logout, driven through the engine with virtual time.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use excal_core::{SessionState, SyncEngine};
use excal_ews::{FolderId, ItemChange, NotificationBatch, RemoteEventType};

use crate::common::fixtures::{USER, single_appointment, test_config, utc};
use crate::common::memory_ews::{MemoryEwsClient, ROOT_FOLDER};
use crate::common::memory_store::MemoryLocalStore;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
    panic!("condition was not met in time");
}

fn setup() -> (Arc<MemoryLocalStore>, Arc<MemoryEwsClient>, SyncEngine) {
    let store = Arc::new(MemoryLocalStore::new());
    let client = Arc::new(MemoryEwsClient::new());
    let engine = SyncEngine::new(test_config(), store.clone()).unwrap();
    (store, client, engine)
}

#[tokio::test(start_paused = true)]
async fn login_runs_first_sync_and_subscribes() {
    let (store, client, engine) = setup();
    client.put_appointment(single_appointment(
        "item-single",
        &FolderId::from(ROOT_FOLDER),
        "Dentist",
        utc(2030, 1, 10, 9, 0),
        Utc::now() - Duration::minutes(10),
    ));

    let handle = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| handle.state() == SessionState::Active).await;

    assert_eq!(store.event_count(USER), 1);
    assert_eq!(client.live_subscription_count(), 1);

    engine.user_logged_out(USER).await;
    assert_eq!(handle.state(), SessionState::Stopped);
    // Logout tears the subscription down best-effort.
    assert_eq!(client.live_subscription_count(), 0);
    assert!(engine.registry().get(USER).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn feed_events_are_applied_on_the_next_tick() {
    let (store, client, engine) = setup();
    let handle = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| handle.state() == SessionState::Active).await;

    let folder = FolderId::from(ROOT_FOLDER);
    let item = single_appointment(
        "item-new",
        &folder,
        "Townhall",
        utc(2030, 4, 1, 16, 0),
        Utc::now() - Duration::minutes(5),
    );
    client.put_appointment(item.clone());
    client.queue_batch(&NotificationBatch {
        folder_changes: Vec::new(),
        item_changes: vec![ItemChange {
            item_id: item.id.clone(),
            parent_folder_id: folder,
            event_type: RemoteEventType::Created,
        }],
    });

    wait_until(|| store.event_by_summary(USER, "Townhall").is_some()).await;

    engine.user_logged_out(USER).await;
}

#[tokio::test(start_paused = true)]
async fn failed_authentication_aborts_the_session_without_retry() {
    let (store, client, engine) = setup();
    client.set_fail_auth(true);

    let handle = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| handle.state() == SessionState::Failed).await;

    let attempts = client.auth_attempts();
    assert_eq!(attempts, 1);

    // The task is gone; no further authentication attempts happen.
    tokio::time::sleep(StdDuration::from_secs(30)).await;
    assert_eq!(client.auth_attempts(), attempts);
    assert_eq!(store.event_count(USER), 0);
    assert_eq!(handle.state(), SessionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn expired_subscription_is_renewed_with_one_retry() {
    let (store, client, engine) = setup();
    let handle = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| handle.state() == SessionState::Active).await;

    client.expire_all_subscriptions();
    assert_eq!(client.live_subscription_count(), 0);

    // The next poll fails, the task resubscribes and retries once, and the
    // feed keeps working.
    wait_until(|| client.live_subscription_count() == 1).await;

    let folder = FolderId::from(ROOT_FOLDER);
    let item = single_appointment(
        "item-late",
        &folder,
        "Late addition",
        utc(2030, 5, 1, 9, 0),
        Utc::now() - Duration::minutes(5),
    );
    client.put_appointment(item.clone());
    client.queue_batch(&NotificationBatch {
        folder_changes: Vec::new(),
        item_changes: vec![ItemChange {
            item_id: item.id.clone(),
            parent_folder_id: folder,
            event_type: RemoteEventType::Created,
        }],
    });
    wait_until(|| store.event_by_summary(USER, "Late addition").is_some()).await;

    engine.user_logged_out(USER).await;
}

#[tokio::test(start_paused = true)]
async fn double_subscription_failure_recovers_on_a_later_tick() {
    let (_store, client, engine) = setup();
    let handle = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| handle.state() == SessionState::Active).await;

    // This tick's renewal fails too: the pass is skipped, a later tick
    // re-establishes the subscription.
    client.expire_all_subscriptions();
    client.set_fail_next_subscribe(true);

    wait_until(|| client.live_subscription_count() == 1).await;

    engine.user_logged_out(USER).await;
}

#[tokio::test(start_paused = true)]
async fn second_login_replaces_the_first_session() {
    let (_store, client, engine) = setup();
    let first = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| first.state() == SessionState::Active).await;

    let second = engine.user_logged_in(USER, client.clone()).await;
    wait_until(|| second.state() == SessionState::Active).await;

    // The first task was shut down when the second login arrived.
    assert_eq!(first.state(), SessionState::Stopped);
    assert_eq!(client.live_subscription_count(), 1);

    engine.user_logged_out(USER).await;
}
