use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy::primitives::B256;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// The last block whose events were fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "number")]
    pub block_number: u64,
    #[serde(rename = "hash")]
    pub block_hash: B256,
}

impl Default for Checkpoint {
    /// Block 1 with a zero hash, used when nothing was persisted yet.
    fn default() -> Self {
        Self { block_number: 1, block_hash: B256::ZERO }
    }
}

/// Storage backend for the watcher checkpoint.
///
/// A deployment uses exactly one store. `load` returning `Ok(None)` means nothing was persisted
/// yet.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Option<Checkpoint>, PersistenceError>>;

    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<(), PersistenceError>>;
}

/// Keeps the checkpoint as JSON (`{"number":..,"hash":..}`) in a single file.
///
/// Writes go to a sibling temporary file that is renamed over the target, so a crash leaves
/// either the old or the new checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io { path: self.path.clone(), source }
    }
}

impl CheckpointStore for FileCheckpointStore {
    /// A missing file yields `None`. So does unreadable or corrupt content, after a warning.
    fn load(&self) -> BoxFuture<'_, Result<Option<Checkpoint>, PersistenceError>> {
        async move {
            let content = match tokio::fs::read_to_string(&self.path).await {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "Could not read checkpoint file");
                    return Ok(None);
                }
            };
            match serde_json::from_str(&content) {
                Ok(checkpoint) => Ok(Some(checkpoint)),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "Ignoring corrupt checkpoint file");
                    Ok(None)
                }
            }
        }
        .boxed()
    }

    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<(), PersistenceError>> {
        async move {
            let content = serde_json::to_vec(&checkpoint)?;
            let mut tmp = self.path.clone().into_os_string();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);
            tokio::fs::write(&tmp, content).await.map_err(|err| self.io_error(err))?;
            tokio::fs::rename(&tmp, &self.path).await.map_err(|err| self.io_error(err))
        }
        .boxed()
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    slot: Arc<Mutex<Option<Checkpoint>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        let store = Self::default();
        *store.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(checkpoint);
        store
    }

    #[must_use]
    pub fn get(&self) -> Option<Checkpoint> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<Checkpoint>, PersistenceError>> {
        futures::future::ready(Ok(self.get())).boxed()
    }

    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<(), PersistenceError>> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(checkpoint);
        self.writes.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(())).boxed()
    }
}

/// Read-through cache in front of a [`CheckpointStore`].
///
/// The store is consulted once; afterwards the cached value is authoritative and only replaced
/// by [`advance`](Self::advance).
pub(crate) struct CheckpointTracker {
    store: Box<dyn CheckpointStore>,
    start_block: Option<u64>,
    cached: Option<Checkpoint>,
}

impl CheckpointTracker {
    pub(crate) fn new(store: Box<dyn CheckpointStore>, start_block: Option<u64>) -> Self {
        Self { store, start_block, cached: None }
    }

    /// The current checkpoint, loading it on first use.
    ///
    /// A configured start block takes precedence over whatever the store holds.
    pub(crate) async fn current(&mut self) -> Result<Checkpoint, PersistenceError> {
        if let Some(checkpoint) = self.cached {
            return Ok(checkpoint);
        }

        let checkpoint = match self.start_block {
            Some(block_number) => Checkpoint { block_number, block_hash: B256::ZERO },
            None => self.store.load().await?.unwrap_or_default(),
        };
        debug!(block_number = checkpoint.block_number, "Loaded checkpoint");

        self.cached = Some(checkpoint);
        Ok(checkpoint)
    }

    /// Persists `checkpoint` and caches it.
    ///
    /// Returns `false` without touching the store when the block number does not move forward.
    /// The cache keeps its old value if the store fails.
    pub(crate) async fn advance(&mut self, checkpoint: Checkpoint) -> Result<bool, PersistenceError> {
        let current = self.current().await?;
        if checkpoint.block_number <= current.block_number {
            trace!(
                block_number = checkpoint.block_number,
                current = current.block_number,
                "Checkpoint unchanged, skipping write"
            );
            return Ok(false);
        }

        self.store.save(checkpoint).await?;
        self.cached = Some(checkpoint);
        debug!(block_number = checkpoint.block_number, block_hash = %checkpoint.block_hash, "Checkpoint advanced");
        Ok(true)
    }
}
