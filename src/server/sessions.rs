//! Live SSE sessions keyed by session id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::util::sync::lock;

/// Outbound messages buffered per session before senders wait.
const SESSION_BUFFER: usize = 64;

/// Session id → outbound message queue for that session's event stream.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    inner: Arc<Mutex<HashMap<String, mpsc::Sender<String>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. The entry lives exactly as long as the returned guard.
    pub fn open(&self) -> (SessionGuard, mpsc::Receiver<String>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        lock(&self.inner).insert(id.clone(), tx);
        debug!(session_id = %id, "session registered");
        (
            SessionGuard {
                id,
                table: self.clone(),
            },
            rx,
        )
    }

    pub fn sender(&self, id: &str) -> Option<mpsc::Sender<String>> {
        lock(&self.inner).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.inner).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    fn remove(&self, id: &str) {
        if lock(&self.inner).remove(id).is_some() {
            debug!(session_id = %id, "session removed");
        }
    }
}

/// Removes its session from the table when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    id: String,
    table: SessionTable,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.table.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_drop_removes_entry() {
        let table = SessionTable::new();
        let (first, _rx1) = table.open();
        let (second, mut rx2) = table.open();
        assert_eq!(table.len(), 2);
        assert_ne!(first.id(), second.id());

        table
            .sender(second.id())
            .unwrap()
            .send("hello".into())
            .await
            .unwrap();
        assert_eq!(rx2.recv().await.as_deref(), Some("hello"));

        let first_id = first.id().to_string();
        drop(first);
        assert!(!table.contains(&first_id));
        assert!(table.sender(&first_id).is_none());
        assert_eq!(table.len(), 1);
    }
}
