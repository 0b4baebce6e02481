//! In-memory history store for tests and storeless deployments.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::message::StoredMessage;
use crate::store::HistoryStore;
use crate::types::HistoryResult;

/// History store that keeps every message in process memory.
///
/// Insertion order is the tie-breaker for equal timestamps, matching the
/// SQLite implementation's rowid ordering.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    messages: Arc<RwLock<Vec<StoredMessage>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages, for assertions in tests.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, message: &StoredMessage) -> HistoryResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn recent(&self, room: &str, limit: u32) -> HistoryResult<Vec<StoredMessage>> {
        let messages = self.messages.read().await;
        let matching: Vec<StoredMessage> = messages
            .iter()
            .filter(|m| m.room == room)
            .cloned()
            .collect();

        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn between(&self, a: &str, b: &str) -> HistoryResult<Vec<StoredMessage>> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| match m.recipient.as_deref() {
                Some(recipient) => {
                    (m.sender == a && recipient == b) || (m.sender == b && recipient == a)
                }
                None => false,
            })
            .cloned()
            .collect())
    }
}
