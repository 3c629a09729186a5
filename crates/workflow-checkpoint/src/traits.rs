//! The [`CheckpointManager`] trait — the pluggable storage boundary the
//! core scheduler calls at the end of every superstep.
//!
//! `workflow-core` never depends on a concrete storage backend; it only
//! depends on this trait (re-exported from this crate) plus the
//! [`crate::Checkpoint`] wire format. [`InMemoryCheckpointManager`] is the one
//! reference implementation this crate ships — anything durable (SQLite,
//! Postgres, an object store) is left to the host, exactly as the
//! specification scopes persistent checkpoint storage out of the core.
//!
//! # Implementing a custom backend
//!
//! ```rust,ignore
//! use workflow_checkpoint::{CheckpointManager, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple, Result};
//! use async_trait::async_trait;
//!
//! struct SqliteCheckpointManager { /* ... */ }
//!
//! #[async_trait]
//! impl CheckpointManager for SqliteCheckpointManager {
//!     async fn put(&self, checkpoint: Checkpoint, metadata: CheckpointMetadata) -> Result<CheckpointConfig> {
//!         // INSERT INTO checkpoints ...
//!         # unimplemented!()
//!     }
//!     async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
//!         // SELECT ... ORDER BY step DESC LIMIT 1
//!         # unimplemented!()
//!     }
//!     async fn list(&self, run_id: &str) -> Result<Vec<CheckpointTuple>> {
//!         # unimplemented!()
//!     }
//! }
//! ```

use crate::checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple};
use crate::error::Result;
use async_trait::async_trait;

/// Persists and retrieves [`Checkpoint`]s for a run.
///
/// Implementations must be safe to share across concurrent runs
/// (`Send + Sync`); each `run_id` is an independent history.
#[async_trait]
pub trait CheckpointManager: Send + Sync {
    /// Persist a checkpoint taken at the end of a superstep.
    ///
    /// Returns the [`CheckpointConfig`] identifying the checkpoint just
    /// written (so the caller can address it precisely rather than via
    /// `latest()`).
    async fn put(
        &self,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig>;

    /// Fetch a checkpoint by config. `config.step = None` means "the most
    /// recent checkpoint for this run".
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// List every checkpoint recorded for a run, oldest first.
    async fn list(&self, run_id: &str) -> Result<Vec<CheckpointTuple>>;

    /// Drop all checkpoints for a run. Not required by the core scheduler;
    /// provided so hosts and tests can reclaim storage once a run is
    /// discarded.
    async fn delete_run(&self, run_id: &str) -> Result<()>;
}
