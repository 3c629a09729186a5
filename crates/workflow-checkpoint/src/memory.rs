//! In-memory [`CheckpointManager`] implementation.
//!
//! `InMemoryCheckpointManager` keeps every checkpoint for every run in a
//! `parking_lot::RwLock<HashMap<run_id, Vec<CheckpointTuple>>>`. It is the
//! reference backend used by the test suite and by hosts that only need
//! checkpointing within a single process lifetime (development, demos,
//! short-lived runs) — exactly the role `InMemoryCheckpointSaver` plays in
//! the teacher crate this one is modeled on. Durable backends are left to
//! the host; this crate does not ship one.

use crate::checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointManager;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Thread-safe, process-local checkpoint store.
#[derive(Default)]
pub struct InMemoryCheckpointManager {
    runs: RwLock<HashMap<String, Vec<CheckpointTuple>>>,
}

impl InMemoryCheckpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every checkpoint across every run. Intended for test
    /// isolation between cases that share a manager instance.
    pub fn clear(&self) {
        self.runs.write().clear();
    }
}

#[async_trait]
impl CheckpointManager for InMemoryCheckpointManager {
    async fn put(
        &self,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let config = CheckpointConfig::at_step(checkpoint.run_id.clone(), checkpoint.step);
        let tuple = CheckpointTuple {
            config: config.clone(),
            checkpoint,
            metadata,
        };
        let mut runs = self.runs.write();
        let history = runs.entry(config.run_id.clone()).or_default();
        history.retain(|existing| existing.checkpoint.step != tuple.checkpoint.step);
        history.push(tuple);
        history.sort_by_key(|t| t.checkpoint.step);
        tracing::debug!(run_id = %config.run_id, step = config.step, "checkpoint written");
        Ok(config)
    }

    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let runs = self.runs.read();
        let Some(history) = runs.get(&config.run_id) else {
            return Ok(None);
        };
        let found = match config.step {
            Some(step) => history.iter().find(|t| t.checkpoint.step == step).cloned(),
            None => history.last().cloned(),
        };
        Ok(found)
    }

    async fn list(&self, run_id: &str) -> Result<Vec<CheckpointTuple>> {
        let runs = self.runs.read();
        Ok(runs.get(run_id).cloned().unwrap_or_default())
    }

    async fn delete_run(&self, run_id: &str) -> Result<()> {
        self.runs.write().remove(run_id);
        Ok(())
    }
}

/// Convenience error used by tests that expect a missing checkpoint.
pub fn not_found(run_id: &str) -> CheckpointError {
    CheckpointError::NotFound(run_id.to_string())
}
