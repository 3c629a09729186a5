//! Runtime configuration. `WorkflowOptions` collects the recognized options
//! from the external interfaces section; a host never loads these from a
//! file or environment — that layer is explicitly out of scope here.

use std::sync::Arc;
use workflow_checkpoint::CheckpointManager;

/// How a run's supersteps are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Supersteps run on a background task; events stream to the consumer
    /// over an unbounded channel as they occur.
    #[default]
    OffThread,
    /// Supersteps run on the consumer's own thread of control; events are
    /// buffered per step and flushed after commit.
    Lockstep,
    /// The workflow runs as a child scheduler driven step-by-step by a
    /// parent executor rather than by its own background task.
    Subworkflow,
}

/// Recognized run-level options.
#[derive(Clone)]
pub struct WorkflowOptions {
    pub allow_concurrent: bool,
    pub execution_mode: ExecutionMode,
    pub checkpoint_manager: Option<Arc<dyn CheckpointManager>>,
    pub include_exception_details: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            allow_concurrent: false,
            execution_mode: ExecutionMode::default(),
            checkpoint_manager: None,
            include_exception_details: false,
        }
    }
}

impl WorkflowOptions {
    pub fn builder() -> WorkflowOptionsBuilder {
        WorkflowOptionsBuilder::default()
    }
}

#[derive(Default)]
pub struct WorkflowOptionsBuilder {
    options: WorkflowOptions,
}

impl WorkflowOptionsBuilder {
    pub fn allow_concurrent(mut self, value: bool) -> Self {
        self.options.allow_concurrent = value;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.options.execution_mode = mode;
        self
    }

    pub fn checkpoint_manager(mut self, manager: Arc<dyn CheckpointManager>) -> Self {
        self.options.checkpoint_manager = Some(manager);
        self
    }

    pub fn include_exception_details(mut self, value: bool) -> Self {
        self.options.include_exception_details = value;
        self
    }

    pub fn build(self) -> WorkflowOptions {
        self.options
    }
}

/// Per-executor options recognized at binding time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    /// If the handler returns a non-null value, the runtime implicitly
    /// issues `sendMessage(returnValue)` on the executor's behalf. Ports and
    /// aggregators set this to false.
    pub auto_send_message_handler_result_object: bool,
    /// Declares the binding's instance safe to reuse across runs. Combined
    /// with `supports_resetting` on the binding (see [`crate::binding`]); if
    /// this is set without resetting support, reuse across sequential runs
    /// is rejected rather than guessed at.
    pub declare_cross_run_shareable: bool,
}
