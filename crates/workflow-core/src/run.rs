//! Run handles (§4.7): the embedding API surface a host drives — enqueue
//! input, advance to the next halt, stream events, check status, and
//! (when checkpointing) restore from a prior checkpoint.

use crate::checkpoint::{
    import_edge_state, import_outstanding_requests, import_queued_envelopes, import_state_entries,
};
use crate::config::WorkflowOptions;
use crate::envelope::ExternalResponse;
use crate::error::Result;
use crate::events::WorkflowEvent;
use crate::graph::Workflow;
use crate::id::{RunId, TypeId};
use crate::portable::PortableValue;
use crate::scheduler::{RunStatus, Scheduler};
use std::sync::Arc;
use workflow_checkpoint::{CheckpointConfig, CheckpointManager};

/// A handle to one run of a workflow. Both execution environments
/// (off-thread streaming and lockstep) share this contract; the
/// `execution_mode` in [`WorkflowOptions`] only changes how events are
/// produced, never the handle's surface.
pub struct Run {
    scheduler: Arc<Scheduler>,
    events: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<WorkflowEvent>>,
}

impl Run {
    pub fn start(workflow: Arc<Workflow>, options: WorkflowOptions, run_id: Option<RunId>) -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let scheduler = Arc::new(Scheduler::new(
            workflow,
            run_id.unwrap_or_default(),
            options,
            tx,
        ));
        Self {
            scheduler,
            events: tokio::sync::Mutex::new(rx),
        }
    }

    pub fn run_id(&self) -> &RunId {
        self.scheduler.run_id()
    }

    pub fn status(&self) -> RunStatus {
        self.scheduler.status()
    }

    /// Inject the initial (or a follow-up) input bound for the start
    /// executor.
    pub fn enqueue(&self, message: PortableValue, declared_type: TypeId) {
        self.scheduler.enqueue_input(message, declared_type);
    }

    /// Answer a previously emitted external request.
    pub fn post_response(&self, response: ExternalResponse) -> Result<()> {
        self.scheduler.post_response(response)
    }

    pub fn cancel(&self) {
        self.scheduler.cancel();
    }

    /// Drive supersteps until the run halts (`Idle`, `PendingRequests`,
    /// `Completed`, `Failed`, or `Cancelled`).
    pub async fn run_to_next_halt(&self) -> Result<RunStatus> {
        self.scheduler.run_to_next_halt().await
    }

    /// Drain events raised so far without blocking past an empty channel.
    /// In lockstep mode this is how a consumer reads the batch flushed at
    /// the end of the step it just drove; in off-thread mode, events may
    /// already be streaming ahead of the current `await`.
    pub async fn drain_events(&self) -> Vec<WorkflowEvent> {
        let mut receiver = self.events.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Await and yield the next event, for off-thread streaming consumers.
    pub async fn next_event(&self) -> Option<WorkflowEvent> {
        self.events.lock().await.recv().await
    }
}

/// Resume a run from a checkpoint: re-seeds state, edge buffers, the
/// inbound queue, and outstanding requests, then returns a [`Run`] handle
/// at `Idle`/`PendingRequests` ready to be driven further.
pub async fn resume(
    workflow: Arc<Workflow>,
    options: WorkflowOptions,
    checkpoint_manager: &dyn CheckpointManager,
    config: CheckpointConfig,
) -> Result<Run> {
    let tuple = checkpoint_manager
        .get_tuple(&config)
        .await?
        .ok_or_else(|| crate::error::WorkflowError::state("no checkpoint found to restore from"))?;
    let checkpoint = tuple.checkpoint;

    let run = Run::start(
        workflow.clone(),
        options,
        Some(RunId::new(checkpoint.run_id.clone())),
    );

    let imported_state = import_state_entries(checkpoint.state_data);
    run.scheduler.state_manager().import_state(imported_state);
    import_edge_state(&workflow.edges, checkpoint.edge_state_data);

    run.scheduler
        .restore_pending_requests(import_outstanding_requests(checkpoint.outstanding_requests));

    let queued = import_queued_envelopes(checkpoint.queued_envelopes);
    run.scheduler.restore_queue(queued);

    run.scheduler
        .restore_executor_snapshots(&checkpoint.instantiated_executors, checkpoint.executor_snapshots)
        .await;

    run.scheduler.restore_step((checkpoint.step + 1) as u64);

    Ok(run)
}
