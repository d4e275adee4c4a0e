// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Explicit registry of per-user synchronization sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a user's synchronization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, first synchronization not yet completed.
    Starting,
    /// First synchronization completed, scheduled runs active.
    Active,
    /// Aborted on a fatal error (failed authentication). A new login is
    /// required to retry.
    Failed,
    /// Torn down on logout or engine shutdown.
    Stopped,
}

/// Handle of one user's background synchronization task.
///
/// Owns the cancellation token delivered to the task; cancelling never
/// corrupts watermarks since those only advance after a completed pass.
pub struct SessionHandle {
    username: String,
    cancel: CancellationToken,
    state: StdMutex<SessionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub(crate) fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            cancel: CancellationToken::new(),
            state: StdMutex::new(SessionState::Starting),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.lock().map_or(SessionState::Failed, |s| *s)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    pub(crate) async fn attach_task(&self, task: JoinHandle<()>) {
        *self.task.lock().await = Some(task);
    }

    /// Cancels the session's task and waits for it to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Maps usernames to their session handles.
///
/// Owned by the engine; sessions are created at login and destroyed at
/// logout, never looked up through ambient global state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, returning the handle it replaced, if any.
    pub async fn register(&self, handle: Arc<SessionHandle>) -> Option<Arc<SessionHandle>> {
        self.sessions
            .lock()
            .await
            .insert(handle.username().to_string(), handle)
    }

    pub async fn get(&self, username: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.get(username).cloned()
    }

    pub async fn remove(&self, username: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.remove(username)
    }

    pub async fn active_usernames(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Removes and returns every session, for engine shutdown.
    pub async fn drain(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.lock().await.drain().map(|(_, h)| h).collect()
    }
}
