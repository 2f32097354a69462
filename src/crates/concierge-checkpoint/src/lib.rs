//! # concierge-checkpoint - Durable Conversation Snapshots
//!
//! **Checkpoint model and storage backends** for suspending and resuming dialog execution.
//!
//! ## Overview
//!
//! The dialog engine writes a [`Checkpoint`] after every completed node. A checkpoint holds
//! the serialized conversation state, the node to run next, and whether execution is paused
//! at an interrupt point waiting for human approval. The latest checkpoint of a thread is
//! the only thing the engine reads when a conversation is resumed, whether that happens a
//! second later or after a process restart.
//!
//! ## Backends
//!
//! | Backend | Durability | Use |
//! |---------|-----------|-----|
//! | [`InMemoryCheckpointSaver`] | process lifetime | tests, demos |
//! | [`FileCheckpointSaver`] | fsynced record per checkpoint | single-node deployments |
//!
//! Custom backends implement [`CheckpointSaver`]. The file backend is generic over
//! [`SerializerProtocol`], with [`JsonSerializer`] (default) and [`BincodeSerializer`].
//! [`ThreadLocks`] serialises work per thread and is shared with the dialog engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use concierge_checkpoint::{Checkpoint, CheckpointSaver, FileCheckpointSaver};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = FileCheckpointSaver::new("./checkpoints");
//!
//!     let checkpoint = Checkpoint::new(
//!         "thread-42",
//!         3,
//!         json!({"messages": [], "dialog_stack": ["update_flight"]}),
//!         Some("update_flight_sensitive_tools".to_string()),
//!     )
//!     .interrupted();
//!     saver.save(checkpoint).await?;
//!
//!     // Later, possibly in another process
//!     if let Some(latest) = saver.load("thread-42").await? {
//!         assert!(latest.interrupted);
//!     }
//!     Ok(())
//! }
//! ```

mod checkpoint;
mod error;
mod file;
mod locks;
mod memory;
mod serializer;
mod traits;

pub use checkpoint::{Checkpoint, CheckpointAck, CheckpointId, CheckpointMetadata, CheckpointSource};
pub use error::{CheckpointError, Result};
pub use file::{FileCheckpointSaver, LATEST_POINTER};
pub use locks::{ThreadGuard, ThreadLocks};
pub use memory::InMemoryCheckpointSaver;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::{CheckpointSaver, CheckpointStream};
