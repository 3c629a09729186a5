//! # workflow-checkpoint
//!
//! Checkpoint persistence for [`workflow-core`](../workflow_core/index.html):
//! the serializable [`Checkpoint`] wire format, the [`CheckpointManager`]
//! storage trait, and an [`InMemoryCheckpointManager`] reference
//! implementation.
//!
//! This crate has no dependency on `workflow-core` — it only knows about
//! flattened `(TypeId, JSON payload)` pairs, never the engine's in-memory
//! `PortableValue`/`ScopeId` types. The scheduler in `workflow-core` converts
//! to and from this wire format at the edges of every superstep commit and
//! restore.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use workflow_checkpoint::{Checkpoint, CheckpointConfig, CheckpointManager, CheckpointMetadata, InMemoryCheckpointManager};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = InMemoryCheckpointManager::new();
//! let checkpoint = Checkpoint::new("run-1", 0);
//! manager.put(checkpoint, CheckpointMetadata::default()).await.unwrap();
//!
//! let latest = manager.get_tuple(&CheckpointConfig::latest("run-1")).await.unwrap();
//! assert!(latest.is_some());
//! # }
//! ```
//!
//! ## Implementing a durable backend
//!
//! Persistent storage (SQLite, Postgres, an object store) is out of scope
//! for this crate by design — implement [`CheckpointManager`] against your
//! own storage and pass it to the scheduler via `WorkflowOptions`.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource, CheckpointTuple,
    EdgeStateEntry, OutstandingRequest, QueuedEnvelope, StateEntry, WireValue,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointManager;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::CheckpointManager;
