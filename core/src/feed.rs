// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Per-user change-feed task and the engine that schedules one per login.

use std::sync::Arc;

use excal_ews::{EwsClient, FolderId, NotificationBatch, SubscriptionId};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::registry::{SessionHandle, SessionRegistry, SessionState};
use crate::store::LocalCalendarStore;
use crate::sync::Orchestrator;

/// Entry point of the synchronization service.
///
/// Spawns one background task per logged-in user onto a bounded worker pool
/// and tears it down at logout. No shared mutable sync state crosses user
/// boundaries; the per-user persistence is partitioned by username inside
/// the local store.
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn LocalCalendarStore>,
    registry: SessionRegistry,
    pass_permits: Arc<Semaphore>,
}

impl SyncEngine {
    /// Creates the engine after validating the configuration.
    pub fn new(config: SyncConfig, store: Arc<dyn LocalCalendarStore>) -> Result<Self> {
        config.normalize()?;
        let pass_permits = Arc::new(Semaphore::new(config.max_concurrent_passes));
        Ok(Self {
            config,
            store,
            registry: SessionRegistry::new(),
            pass_permits,
        })
    }

    /// The session registry, for inspection by front-ends.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Starts a synchronization session for a user who just logged in.
    ///
    /// The `client` carries the user's own authenticated session with the
    /// remote service; credentials never pass through the engine. An
    /// existing session of the same user (login from a second client) is
    /// torn down first.
    pub async fn user_logged_in(
        &self,
        username: &str,
        client: Arc<dyn EwsClient>,
    ) -> Arc<SessionHandle> {
        if let Some(previous) = self.registry.remove(username).await {
            debug!(user = username, "closing previous session of the same user");
            previous.shutdown().await;
        }

        let orchestrator = Arc::new(Orchestrator::new(
            username,
            self.config.clone(),
            self.store.clone(),
            client.clone(),
        ));
        let handle = Arc::new(SessionHandle::new(username));
        let task = ChangeFeedTask {
            username: username.to_string(),
            config: self.config.clone(),
            client,
            orchestrator,
            permits: self.pass_permits.clone(),
            session: handle.clone(),
            subscription: None,
            watched_folders: Vec::new(),
            first_run: true,
        };
        handle.attach_task(tokio::spawn(task.run())).await;
        self.registry.register(handle.clone()).await;

        info!(user = username, "user logged in, synchronization task started");
        handle
    }

    /// Tears down a user's synchronization session at logout.
    pub async fn user_logged_out(&self, username: &str) {
        if let Some(handle) = self.registry.remove(username).await {
            handle.shutdown().await;
            info!(user = username, "synchronization task stopped");
        }
    }

    /// Stops every session, for process shutdown.
    pub async fn shutdown(&self) {
        for handle in self.registry.drain().await {
            handle.shutdown().await;
        }
    }
}

/// The per-user scheduled loop: triggers orchestrator passes and keeps the
/// push subscription alive.
struct ChangeFeedTask {
    username: String,
    config: SyncConfig,
    client: Arc<dyn EwsClient>,
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
    session: Arc<SessionHandle>,
    subscription: Option<SubscriptionId>,
    watched_folders: Vec<FolderId>,
    first_run: bool,
}

impl ChangeFeedTask {
    async fn run(mut self) {
        let cancel = self.session.cancel_token();

        tokio::select! {
            () = cancel.cancelled() => {
                self.session.set_state(SessionState::Stopped);
                return;
            }
            () = tokio::time::sleep(self.config.first_sync_delay()) => {}
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.tick().await {
                        break;
                    }
                }
            }
        }

        self.teardown().await;
        if self.session.state() != SessionState::Failed {
            self.session.set_state(SessionState::Stopped);
        }
    }

    /// One scheduled run. Returns `false` when the session must stop.
    async fn tick(&mut self) -> bool {
        // One pass occupies one worker-pool slot for its whole duration.
        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            return false;
        };

        if self.first_run {
            return self.first_synchronization().await;
        }

        debug!(user = %self.username, "running scheduled synchronization");
        let batch = match self.poll_with_renewal().await {
            Ok(batch) => batch,
            Err(e) => {
                // Pass failure: the watermark stays put and the next tick
                // retries from the same point.
                warn!(user = %self.username, error = %e, "subscription poll failed, pass skipped");
                return true;
            }
        };

        match self.orchestrator.incremental_pass(batch.as_ref()).await {
            Ok(summary) if summary.skipped => true,
            Ok(summary) => {
                let changed =
                    summary.folders_changed || summary.watched_folders != self.watched_folders;
                self.watched_folders = summary.watched_folders;
                if changed {
                    self.renew_subscription().await;
                }
                true
            }
            Err(e) => {
                error!(user = %self.username, error = %e, "synchronization pass failed");
                true
            }
        }
    }

    async fn first_synchronization(&mut self) -> bool {
        info!(user = %self.username, "running first synchronization");
        match self.orchestrator.full_pass().await {
            Ok(summary) => {
                self.first_run = false;
                self.watched_folders = summary.watched_folders;
                // Catching change events starts after the first
                // synchronization.
                self.renew_subscription().await;
                self.session.set_state(SessionState::Active);
                true
            }
            Err(e) if e.is_auth() => {
                // Fatal: the external login/logout cycle decides whether to
                // retry with fresh credentials.
                error!(
                    user = %self.username,
                    error = %e,
                    "authentication with the remote service failed, sync session aborted"
                );
                self.session.set_state(SessionState::Failed);
                false
            }
            Err(e) => {
                error!(
                    user = %self.username,
                    error = %e,
                    "first synchronization failed, retrying on the next run"
                );
                true
            }
        }
    }

    /// Drains the subscription, recovering an expired one with exactly one
    /// resubscribe-and-retry. A second failure is a pass failure.
    async fn poll_with_renewal(&mut self) -> Result<Option<NotificationBatch>> {
        let Some(subscription) = self.subscription.clone() else {
            // No live subscription (an earlier renewal failed); run the pass
            // on watermarks alone and try to re-establish the feed.
            self.renew_subscription().await;
            return Ok(None);
        };
        match self.client.poll_subscription(&subscription).await {
            Ok(batch) => Ok(Some(batch)),
            Err(e) => {
                warn!(
                    user = %self.username,
                    error = %e,
                    "subscription seems expired, renewing and retrying once"
                );
                self.resubscribe().await?;
                match &self.subscription {
                    Some(subscription) => {
                        let batch = self
                            .client
                            .poll_subscription(subscription)
                            .await
                            .map_err(|e| SyncError::Subscription(e.to_string()))?;
                        Ok(Some(batch))
                    }
                    None => Err(SyncError::Subscription(
                        "no subscription after renewal".into(),
                    )),
                }
            }
        }
    }

    async fn renew_subscription(&mut self) {
        if let Err(e) = self.resubscribe().await {
            warn!(
                user = %self.username,
                error = %e,
                "subscription renewal failed, continuing with plain interval scans"
            );
        }
    }

    /// Replaces the subscription with a fresh one over the watched folders.
    /// Renewal is not transactional: an unsubscribe failure is ignored, the
    /// stale subscription lapses server-side.
    async fn resubscribe(&mut self) -> Result<()> {
        if let Some(old) = self.subscription.take() {
            if let Err(e) = self.client.unsubscribe(&old).await {
                debug!(user = %self.username, error = %e, "unsubscribe failed, renewing anyway");
            }
        }
        let subscription = self
            .client
            .subscribe(&self.watched_folders)
            .await
            .map_err(|e| SyncError::Subscription(e.to_string()))?;
        debug!(user = %self.username, subscription = %subscription, "push subscription established");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Best-effort teardown of the in-flight subscription at session end.
    async fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            info!(user = %self.username, "tearing down push subscription");
            if let Err(e) = self.client.unsubscribe(&subscription).await {
                warn!(user = %self.username, error = %e, "best-effort unsubscribe failed");
            }
        }
    }
}
