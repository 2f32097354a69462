//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointSaver`] keeps every checkpoint of every thread in a
//! `Arc<RwLock<HashMap<thread_id, Vec<Checkpoint>>>>`. Clones share the same storage,
//! so one saver can be handed to several engines in a test.
//!
//! Data is lost when the process exits; use
//! [`FileCheckpointSaver`](crate::FileCheckpointSaver) when a conversation must survive a
//! restart.
//!
//! ```rust
//! use concierge_checkpoint::{Checkpoint, CheckpointSaver, InMemoryCheckpointSaver};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = InMemoryCheckpointSaver::new();
//!     saver.save(Checkpoint::new("session-1", 0, json!({}), None)).await?;
//!
//!     let latest = saver.load("session-1").await?.expect("saved above");
//!     assert_eq!(latest.step, 0);
//!     Ok(())
//! }
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointAck},
    error::{CheckpointError, Result},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory checkpoint storage
type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// In-memory checkpoint saver
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointSaver {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointSaver {
    /// Create a new in-memory checkpoint saver
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of threads being tracked
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Get the total number of checkpoints across all threads
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Clear all checkpoints (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

impl Default for InMemoryCheckpointSaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).and_then(|entries| entries.last().cloned()))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointAck> {
        if checkpoint.thread_id.is_empty() {
            return Err(CheckpointError::Invalid("thread_id is required".to_string()));
        }

        let ack = CheckpointAck::from(&checkpoint);
        let mut storage = self.storage.write().await;
        storage
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint);
        Ok(ack)
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<CheckpointStream> {
        let storage = self.storage.read().await;
        let mut history: Vec<Checkpoint> = storage
            .get(thread_id)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default();

        if let Some(limit) = limit {
            history.truncate(limit);
        }

        Ok(Box::pin(stream::iter(history.into_iter().map(Ok))))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        Ok(())
    }
}
