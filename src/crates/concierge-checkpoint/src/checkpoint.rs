//! Checkpoint data model
//!
//! A [`Checkpoint`] is a durable snapshot of one conversation thread: the serialized
//! conversation state, the node the engine will run next, and whether execution is
//! paused at an interrupt point. Checkpoints are written after every completed node, so
//! the latest checkpoint for a thread is the single source of truth when a thread is
//! resumed, including after a process restart.
//!
//! The state is kept as an opaque [`serde_json::Value`] so this crate does not depend on
//! the engine's state type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// What produced a checkpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Written after new user input was merged into the state
    Input,
    /// Written by the stepping loop after a node completed
    Loop,
    /// Written after an approval decision rewrote the pending state
    Update,
    /// Written when execution continued from an interrupt
    Resume,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Name of the node whose completion produced this checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the producing node
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Add custom metadata
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Snapshot of a conversation thread at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The version of the checkpoint format
    pub v: i32,

    /// Unique checkpoint ID
    pub id: CheckpointId,

    /// Thread this checkpoint belongs to
    pub thread_id: String,

    /// Monotonic step counter within the thread
    pub step: u64,

    /// When the checkpoint was taken
    pub ts: DateTime<Utc>,

    /// Serialized conversation state
    pub state: serde_json::Value,

    /// Node to execute next; `None` once the turn has terminated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_node: Option<String>,

    /// Whether execution is paused before `next_node`
    pub interrupted: bool,

    /// Checkpoint metadata
    #[serde(default)]
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a running checkpoint for `thread_id`
    pub fn new(
        thread_id: impl Into<String>,
        step: u64,
        state: serde_json::Value,
        next_node: Option<String>,
    ) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            step,
            ts: Utc::now(),
            state,
            next_node,
            interrupted: false,
            metadata: CheckpointMetadata::default(),
        }
    }

    /// Mark this checkpoint as paused before its `next_node`
    pub fn interrupted(mut self) -> Self {
        self.interrupted = true;
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: CheckpointMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// True when the thread has no further node scheduled
    pub fn is_terminal(&self) -> bool {
        self.next_node.is_none()
    }
}

/// Acknowledgement returned once a checkpoint is durably stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointAck {
    /// Thread the checkpoint was written for
    pub thread_id: String,

    /// ID of the stored checkpoint
    pub checkpoint_id: CheckpointId,

    /// Step of the stored checkpoint
    pub step: u64,
}

impl From<&Checkpoint> for CheckpointAck {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            thread_id: checkpoint.thread_id.clone(),
            checkpoint_id: checkpoint.id.clone(),
            step: checkpoint.step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = Checkpoint::new("thread-1", 0, json!({"messages": []}), Some("primary_assistant".into()));
        assert_eq!(checkpoint.v, Checkpoint::CURRENT_VERSION);
        assert_eq!(checkpoint.thread_id, "thread-1");
        assert!(!checkpoint.interrupted);
        assert!(!checkpoint.is_terminal());
    }

    #[test]
    fn test_interrupted_checkpoint() {
        let checkpoint = Checkpoint::new("t", 3, json!({}), Some("update_flight_sensitive_tools".into()))
            .interrupted();
        assert!(checkpoint.interrupted);
        assert_eq!(checkpoint.next_node.as_deref(), Some("update_flight_sensitive_tools"));
    }

    #[test]
    fn test_metadata_serialization() {
        let metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Loop)
            .with_node("leave_skill")
            .with_extra("scope", json!("book_hotel"));

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["source"], "loop");
        assert_eq!(value["node"], "leave_skill");
        // extra is flattened into the top level
        assert_eq!(value["scope"], "book_hotel");
    }

    #[test]
    fn test_ack_from_checkpoint() {
        let checkpoint = Checkpoint::new("t", 7, json!({}), None);
        let ack = CheckpointAck::from(&checkpoint);
        assert_eq!(ack.thread_id, "t");
        assert_eq!(ack.step, 7);
        assert_eq!(ack.checkpoint_id, checkpoint.id);
    }
}
