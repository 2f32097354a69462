//! Checkpoint storage trait
//!
//! [`CheckpointSaver`] is the boundary between the dialog engine and whatever durable
//! storage a deployment uses. The engine only ever needs the latest checkpoint of a
//! thread to resume it; history listing exists for inspection and debugging.
//!
//! # Contract
//!
//! - `save` must not return before the checkpoint is durable (at-least-once).
//! - `load` and `save` are atomic per thread id. Thread ids partition the keyspace, so
//!   implementations never need cross-thread coordination.
//! - A failing `save` must leave the previously committed checkpoint intact.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use concierge_checkpoint::{Checkpoint, CheckpointAck, CheckpointSaver, CheckpointStream, Result};
//! use async_trait::async_trait;
//!
//! struct RedisSaver { client: redis::Client }
//!
//! #[async_trait]
//! impl CheckpointSaver for RedisSaver {
//!     async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
//!         // GET checkpoints:{thread_id}:latest
//!         todo!()
//!     }
//!
//!     async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointAck> {
//!         // MULTI; RPUSH history; SET latest; EXEC
//!         todo!()
//!     }
//!
//!     async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<CheckpointStream> {
//!         todo!()
//!     }
//! }
//! ```

use crate::{
    checkpoint::{Checkpoint, CheckpointAck},
    error::Result,
};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Stream of checkpoints, newest first
pub type CheckpointStream = Pin<Box<dyn Stream<Item = Result<Checkpoint>> + Send + 'static>>;

/// Persistence backend for conversation checkpoints
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Load the latest checkpoint for a thread, if any
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Durably store a checkpoint for `checkpoint.thread_id`
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointAck>;

    /// List a thread's checkpoints, newest first
    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<CheckpointStream>;

    /// Delete every checkpoint of a thread
    ///
    /// Retention is an external policy; the engine never calls this.
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let _ = thread_id;
        Ok(())
    }
}
