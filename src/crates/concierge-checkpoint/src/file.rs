//! Durable file-backed checkpoint storage
//!
//! [`FileCheckpointSaver`] gives every thread its own directory under a base path. Each
//! checkpoint is an individual record named by a zero-padded sequence number, and a
//! `LATEST` pointer file names the newest record:
//!
//! ```text
//! <base>/<thread_id>/00000000000000000000.json
//! <base>/<thread_id>/00000000000000000001.json
//! <base>/<thread_id>/LATEST                      -> "00000000000000000001.json"
//! ```
//!
//! A save writes one record and then swaps the pointer, so its cost does not depend on how
//! long the thread already is. Both files go through a temporary sibling that is flushed
//! and fsynced before an atomic rename; `save` returning `Ok` means the checkpoint is on
//! disk. A record newer than `LATEST` can only be left by a crash between the two renames
//! and is ignored until the next save replaces it.
//!
//! Operations on the same thread are serialised by a [`ThreadLocks`] entry; different
//! threads never contend.

use crate::{
    checkpoint::{Checkpoint, CheckpointAck},
    error::{CheckpointError, Result},
    locks::ThreadLocks,
    serializer::{JsonSerializer, SerializerProtocol},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Name of the per-thread pointer file
pub const LATEST_POINTER: &str = "LATEST";

const SEQ_WIDTH: usize = 20;

/// File-backed checkpoint saver
pub struct FileCheckpointSaver<S: SerializerProtocol = JsonSerializer> {
    base_path: PathBuf,
    serializer: S,
    locks: ThreadLocks,
}

impl FileCheckpointSaver<JsonSerializer> {
    /// Create a JSON file saver rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_serializer(base_path, JsonSerializer)
    }
}

impl<S: SerializerProtocol> FileCheckpointSaver<S> {
    /// Create a file saver with a custom serializer
    pub fn with_serializer(base_path: impl Into<PathBuf>, serializer: S) -> Self {
        Self {
            base_path: base_path.into(),
            serializer,
            locks: ThreadLocks::new(),
        }
    }

    /// Directory holding the thread directories
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding one thread's records
    pub fn thread_dir(&self, thread_id: &str) -> Result<PathBuf> {
        validate_thread_id(thread_id)?;
        Ok(self.base_path.join(thread_id))
    }

    fn record_name(&self, seq: u64) -> String {
        format!("{:0width$}.{}", seq, self.serializer.extension(), width = SEQ_WIDTH)
    }

    fn record_seq(&self, name: &str) -> Option<u64> {
        let (digits, ext) = name.split_once('.')?;
        if ext != self.serializer.extension() || digits.len() != SEQ_WIDTH {
            return None;
        }
        digits.parse().ok()
    }

    /// Sequence number of the record `LATEST` points at
    async fn latest_seq(&self, dir: &Path) -> Result<Option<u64>> {
        let pointer = match tokio::fs::read_to_string(dir.join(LATEST_POINTER)).await {
            Ok(pointer) => pointer,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let name = pointer.trim();
        self.record_seq(name).map(Some).ok_or_else(|| {
            CheckpointError::Storage(format!(
                "{} points at '{}', which is not a .{} record",
                dir.join(LATEST_POINTER).display(),
                name,
                self.serializer.extension()
            ))
        })
    }

    async fn read_record(&self, dir: &Path, seq: u64) -> Result<Checkpoint> {
        let bytes = tokio::fs::read(dir.join(self.record_name(seq))).await?;
        self.serializer.loads(&bytes)
    }

    /// Record sequence numbers up to and including `latest`, newest first
    async fn record_seqs(&self, dir: &Path, latest: u64) -> Result<Vec<u64>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut seqs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(seq) = entry.file_name().to_str().and_then(|name| self.record_seq(name)) {
                if seq <= latest {
                    seqs.push(seq);
                }
            }
        }
        seqs.sort_unstable_by(|a, b| b.cmp(a));
        Ok(seqs)
    }

    /// Write `bytes` to `dir/name` through a fsynced temporary file and an atomic rename
    async fn write_atomic(&self, thread_id: &str, dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
        let target = dir.join(name);
        let tmp_path = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &target).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            tracing::error!(thread_id, file = name, error = %e, "Failed to persist checkpoint");
            return Err(CheckpointError::Storage(format!(
                "failed to write {} for thread '{}': {}",
                name, thread_id, e
            )));
        }
        Ok(())
    }
}

/// Reject thread ids that are unsafe as directory names
fn validate_thread_id(thread_id: &str) -> Result<()> {
    if thread_id.is_empty() {
        return Err(CheckpointError::Invalid("thread id cannot be empty".to_string()));
    }
    if thread_id.contains('/')
        || thread_id.contains('\\')
        || thread_id.contains("..")
        || thread_id.starts_with('.')
        || thread_id.chars().any(|c| c.is_control())
    {
        return Err(CheckpointError::Invalid(format!(
            "thread id contains invalid characters: {thread_id:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointSaver for FileCheckpointSaver<S> {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let dir = self.thread_dir(thread_id)?;
        let _guard = self.locks.acquire(thread_id).await;

        match self.latest_seq(&dir).await? {
            Some(seq) => Ok(Some(self.read_record(&dir, seq).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointAck> {
        let thread_id = checkpoint.thread_id.clone();
        let dir = self.thread_dir(&thread_id)?;
        let _guard = self.locks.acquire(&thread_id).await;

        tokio::fs::create_dir_all(&dir).await?;
        let seq = self.latest_seq(&dir).await?.map_or(0, |latest| latest + 1);
        let name = self.record_name(seq);
        let bytes = self.serializer.dumps(&checkpoint)?;

        self.write_atomic(&thread_id, &dir, &name, &bytes).await?;
        self.write_atomic(&thread_id, &dir, LATEST_POINTER, name.as_bytes()).await?;

        let ack = CheckpointAck::from(&checkpoint);
        tracing::trace!(thread_id = %ack.thread_id, step = ack.step, record = seq, "Checkpoint persisted");
        Ok(ack)
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<CheckpointStream> {
        let dir = self.thread_dir(thread_id)?;
        let _guard = self.locks.acquire(thread_id).await;

        let Some(latest) = self.latest_seq(&dir).await? else {
            return Ok(Box::pin(stream::empty::<Result<Checkpoint>>()));
        };
        let mut seqs = self.record_seqs(&dir, latest).await?;
        if let Some(limit) = limit {
            seqs.truncate(limit);
        }

        let mut history = Vec::with_capacity(seqs.len());
        for seq in seqs {
            history.push(self.read_record(&dir, seq).await?);
        }
        Ok(Box::pin(stream::iter(history.into_iter().map(Ok))))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let dir = self.thread_dir(thread_id)?;
        let _guard = self.locks.acquire(thread_id).await;

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
