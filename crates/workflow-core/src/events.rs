//! [`WorkflowEvent`] — the typed events raised by the scheduler and
//! executors, consumed through the run handles in [`crate::run`].

use crate::id::{EdgeId, ExecutorId, RequestId, RunId};

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    ExecutorInvoked {
        run_id: RunId,
        step: u64,
        executor_id: ExecutorId,
    },
    ExecutorCompleted {
        run_id: RunId,
        step: u64,
        executor_id: ExecutorId,
    },
    ExecutorFailure {
        run_id: RunId,
        step: u64,
        executor_id: ExecutorId,
        message: String,
    },
    /// Opaque, executor-defined progress payload (the specification's
    /// `AgentRunUpdateEvent`). The core never interprets the payload.
    AgentRunUpdate {
        run_id: RunId,
        executor_id: ExecutorId,
        payload: serde_json::Value,
    },
    SuperStepCompleted {
        run_id: RunId,
        step: u64,
        activated_executors: Vec<ExecutorId>,
        newly_instantiated: Vec<ExecutorId>,
        state_updated: bool,
        has_pending_messages: bool,
        has_pending_requests: bool,
        checkpoint_step: Option<i64>,
    },
    WorkflowOutput {
        run_id: RunId,
        executor_id: ExecutorId,
        value: serde_json::Value,
    },
    WorkflowWarning {
        run_id: RunId,
        message: String,
    },
    /// An executor asked the run to halt gracefully (not a failure).
    RequestHalt {
        run_id: RunId,
        executor_id: ExecutorId,
        reason: Option<String>,
    },
    /// A port emitted a request that now awaits a host response.
    ExternalRequestRaised {
        run_id: RunId,
        port_id: crate::id::PortId,
        request_id: RequestId,
    },
}
