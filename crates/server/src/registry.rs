//! Active connection registry
//!
//! Tracks live connections for capacity limiting and the
//! `/api/connections` listing. Entries are removed when their guard drops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use voice_order_core::ConnectionState;

use crate::ServerError;

/// Shared view of one connection
#[derive(Debug)]
pub struct ConnectionEntry {
    id: String,
    session_id: RwLock<Option<String>>,
    state: RwLock<ConnectionState>,
    opened_at: Instant,
}

impl ConnectionEntry {
    fn new(id: String) -> Self {
        Self {
            id,
            session_id: RwLock::new(None),
            state: RwLock::new(ConnectionState::Handshaking),
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn set_session(&self, session_id: impl Into<String>) {
        *self.session_id.write() = Some(session_id.into());
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: self.id.clone(),
            session_id: self.session_id(),
            state: self.state().as_str(),
            age_ms: self.opened_at.elapsed().as_millis() as u64,
        }
    }
}

/// Serializable listing row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub id: String,
    pub session_id: Option<String>,
    pub state: &'static str,
    pub age_ms: u64,
}

/// Registry of live connections
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<String, Arc<ConnectionEntry>>>,
    max_connections: usize,
    active: watch::Sender<usize>,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            max_connections,
            active: watch::channel(0).0,
        })
    }

    /// Reserve a slot for a new connection
    pub fn register(self: &Arc<Self>) -> Result<ConnectionGuard, ServerError> {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_connections {
            return Err(ServerError::CapacityExceeded(self.max_connections));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let entry = Arc::new(ConnectionEntry::new(id.clone()));
        entries.insert(id, entry.clone());
        self.active.send_replace(entries.len());

        Ok(ConnectionGuard {
            registry: Arc::clone(self),
            entry,
        })
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConnectionEntry>> {
        self.entries.read().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn capacity(&self) -> usize {
        self.max_connections
    }

    pub fn list(&self) -> Vec<ConnectionSnapshot> {
        let mut rows: Vec<_> = self.entries.read().values().map(|e| e.snapshot()).collect();
        rows.sort_by(|a, b| b.age_ms.cmp(&a.age_ms));
        rows
    }

    /// Wait until every connection has finished, up to `timeout`
    ///
    /// Returns false when connections were still live at the deadline.
    pub async fn wait_drained(&self, timeout: Duration) -> bool {
        let mut active = self.active.subscribe();
        tokio::time::timeout(timeout, active.wait_for(|count| *count == 0))
            .await
            .is_ok_and(|changed| changed.is_ok())
    }

    fn remove(&self, id: &str) {
        let mut entries = self.entries.write();
        entries.remove(id);
        self.active.send_replace(entries.len());
    }
}

/// Registration held for the lifetime of a connection
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    entry: Arc<ConnectionEntry>,
}

impl ConnectionGuard {
    pub fn entry(&self) -> Arc<ConnectionEntry> {
        Arc::clone(&self.entry)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.entry.id());
        tracing::debug!(connection_id = %self.entry.id(), "Connection unregistered");
    }
}
