//! Serialization protocol for persisted checkpoints

use crate::checkpoint::Checkpoint;
use crate::error::Result;

/// Encodes single checkpoints for durable backends
///
/// Implementations choose the on-disk format; the file saver uses
/// [`extension`](SerializerProtocol::extension) to name checkpoint records.
pub trait SerializerProtocol: Send + Sync {
    /// Encode one checkpoint
    fn dumps(&self, checkpoint: &Checkpoint) -> Result<Vec<u8>>;

    /// Decode one checkpoint
    fn loads(&self, data: &[u8]) -> Result<Checkpoint>;

    /// File extension for this format (without the dot)
    fn extension(&self) -> &'static str;
}

/// JSON serializer (default, human-readable)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps(&self, checkpoint: &Checkpoint) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(checkpoint)?)
    }

    fn loads(&self, data: &[u8]) -> Result<Checkpoint> {
        Ok(serde_json::from_slice(data)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Compact binary serializer using bincode
///
/// Checkpoint state is an arbitrary JSON document and metadata is flattened, neither of
/// which bincode can encode directly, so a checkpoint is stored as its JSON text inside
/// a bincode frame.
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn dumps(&self, checkpoint: &Checkpoint) -> Result<Vec<u8>> {
        let frame = serde_json::to_string(checkpoint)?;
        Ok(bincode::serialize(&frame)?)
    }

    fn loads(&self, data: &[u8]) -> Result<Checkpoint> {
        let frame: String = bincode::deserialize(data)?;
        Ok(serde_json::from_str(&frame)?)
    }

    fn extension(&self) -> &'static str {
        "bin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paused() -> Checkpoint {
        Checkpoint::new(
            "t",
            3,
            json!({"messages": [{"id": "m1"}], "dialog_stack": ["book_hotel"]}),
            Some("book_hotel_sensitive_tools".into()),
        )
        .interrupted()
    }

    #[test]
    fn test_json_serializer() {
        let serializer = JsonSerializer::new();
        let bytes = serializer.dumps(&paused()).unwrap();
        let restored = serializer.loads(&bytes).unwrap();
        assert_eq!(restored.step, 3);
        assert_eq!(restored.state["messages"][0]["id"], "m1");
        assert_eq!(serializer.extension(), "json");
    }

    #[test]
    fn test_bincode_serializer_keeps_dynamic_state() {
        let serializer = BincodeSerializer::new();
        let bytes = serializer.dumps(&paused()).unwrap();
        let restored = serializer.loads(&bytes).unwrap();
        assert_eq!(restored.next_node.as_deref(), Some("book_hotel_sensitive_tools"));
        assert_eq!(restored.state["dialog_stack"][0], "book_hotel");
        assert!(restored.interrupted);
    }

    #[test]
    fn test_bincode_rejects_garbage() {
        let serializer = BincodeSerializer::new();
        assert!(serializer.loads(&[0xff, 0x01]).is_err());
    }
}
