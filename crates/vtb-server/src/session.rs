// SPDX-License-Identifier: MIT OR Apache-2.0
//! Live SSE sessions, keyed by the id handed out in the `endpoint` event.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Messages queued per session before senders start waiting.
pub const SESSION_BUFFER: usize = 64;

/// The sending half of one session's event stream.
#[derive(Debug, Clone)]
pub struct Session {
    /// Outbound JSON-RPC messages.
    pub tx: mpsc::Sender<Value>,
    /// Bearer token presented when the stream was opened.
    pub token: Option<String>,
}

/// Shared table of open sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Session>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Session>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new session and return its id, the receiving half, and a
    /// guard that removes the session when dropped.
    pub fn open(&self, token: Option<String>) -> (Uuid, mpsc::Receiver<Value>, SessionGuard) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.write().insert(id, Session { tx, token });
        let guard = SessionGuard {
            table: self.clone(),
            id,
        };
        (id, rx, guard)
    }

    /// Look up a session.
    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.read().get(id).cloned()
    }

    /// Forget a session. Returns whether it existed.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.write().remove(id).is_some()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no session is open.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Removes its session from the table on drop.
#[derive(Debug)]
pub struct SessionGuard {
    table: SessionTable,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.table.remove(&self.id) {
            tracing::debug!(target: "vtb.server", session_id = %self.id, "session closed");
        }
    }
}
