//! The error taxonomy from the specification's error handling design,
//! realized as one `thiserror`-derived enum with a crate-wide `Result`
//! alias, mirroring the teacher's `GraphError`/`CheckpointError` split.

use crate::id::{EdgeId, ExecutorId, RequestId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Duplicate ids, dangling edge endpoints, start executor not accepting
    /// the input type.
    #[error("build error: {0}")]
    Build(String),

    /// A fan-out partitioner returned an out-of-range index, or a fan-in
    /// source's buffered value did not decode to the declared type.
    #[error("edge error on {edge_id}: {message}")]
    Edge { edge_id: EdgeId, message: String },

    /// An executor handler raised an error.
    #[error("executor {executor_id} failed: {message}")]
    Handler {
        executor_id: ExecutorId,
        message: String,
    },

    /// `exportState` called with a non-empty update log, or a committed
    /// value did not match the type requested on read.
    #[error("state error: {0}")]
    State(String),

    /// Storage-level failure surfaced from the attached checkpoint manager.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] workflow_checkpoint::CheckpointError),

    /// `postResponse` referenced a `requestId` the coordinator has never
    /// seen, or has already matched.
    #[error("unknown request id: {0}")]
    UnknownRequest(RequestId),

    #[error("duplicate response for request id: {0}")]
    DuplicateResponse(RequestId),

    /// Cooperative cancellation reached a terminal state.
    #[error("run was cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    pub fn edge(edge_id: EdgeId, message: impl Into<String>) -> Self {
        Self::Edge {
            edge_id,
            message: message.into(),
        }
    }

    pub fn handler(executor_id: ExecutorId, message: impl Into<String>) -> Self {
        Self::Handler {
            executor_id,
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }
}
