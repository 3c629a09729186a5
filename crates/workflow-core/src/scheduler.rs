//! The superstep scheduler (§4.3): the Pregel loop that is the only
//! component allowed to mutate the message queues and drive handler
//! invocation.

use crate::checkpoint::build_checkpoint;
use crate::config::{ExecutionMode, WorkflowOptions};
use crate::envelope::{ExternalRequest, ExternalResponse, MessageEnvelope};
use crate::error::{Result, WorkflowError};
use crate::events::WorkflowEvent;
use crate::executor::{Executor, WorkflowContext};
use crate::graph::Workflow;
use crate::id::{ExecutorId, PortId, RequestId, RunId, TypeId};
use crate::portable::PortableValue;
use crate::state::StateManager;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use workflow_checkpoint::{CheckpointMetadata, WireValue};

/// `NotStarted → Running ⇄ Idle ⇄ PendingRequests → Completed | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running,
    Idle,
    PendingRequests,
    Completed,
    Failed,
    Cancelled,
}

/// Drives one run of a [`Workflow`] through its supersteps.
///
/// Owns the inbound queue, the state manager, the edge-runner set (via
/// `workflow.edges`), and the request/response coordinator. Executors own
/// only what the state manager exposes to them.
pub struct Scheduler {
    workflow: Arc<Workflow>,
    run_id: RunId,
    options: WorkflowOptions,
    state: StateManager,
    store: Store,
    coordinator: crate::coordinator::RequestResponseCoordinator,
    instantiated: std::sync::Mutex<HashMap<ExecutorId, Arc<dyn crate::executor::Executor>>>,
    queue: std::sync::Mutex<HashMap<ExecutorId, Vec<MessageEnvelope>>>,
    step: std::sync::atomic::AtomicU64,
    status: std::sync::Mutex<RunStatus>,
    cancelled: std::sync::atomic::AtomicBool,
    halted: std::sync::atomic::AtomicBool,
    /// Events raised during the superstep currently in flight, held back
    /// from `events` until commit when running in [`ExecutionMode::Lockstep`].
    event_buffer: std::sync::Mutex<Vec<WorkflowEvent>>,
    pub(crate) events: tokio::sync::mpsc::UnboundedSender<WorkflowEvent>,
}

impl Scheduler {
    pub fn new(
        workflow: Arc<Workflow>,
        run_id: RunId,
        options: WorkflowOptions,
        events: tokio::sync::mpsc::UnboundedSender<WorkflowEvent>,
    ) -> Self {
        Self {
            workflow,
            run_id,
            options,
            state: StateManager::new(),
            store: Store::new(),
            coordinator: crate::coordinator::RequestResponseCoordinator::new(),
            instantiated: std::sync::Mutex::new(HashMap::new()),
            queue: std::sync::Mutex::new(HashMap::new()),
            step: std::sync::atomic::AtomicU64::new(0),
            status: std::sync::Mutex::new(RunStatus::NotStarted),
            cancelled: std::sync::atomic::AtomicBool::new(false),
            halted: std::sync::atomic::AtomicBool::new(false),
            event_buffer: std::sync::Mutex::new(Vec::new()),
            events,
        }
    }

    /// Send immediately in off-thread/subworkflow mode; buffer until the
    /// step commits in lockstep mode, per [`ExecutionMode::Lockstep`].
    fn emit_event(&self, event: WorkflowEvent) {
        match self.options.execution_mode {
            ExecutionMode::Lockstep => {
                self.event_buffer.lock().unwrap().push(event);
            }
            ExecutionMode::OffThread | ExecutionMode::Subworkflow => {
                self.events.send(event).ok();
            }
        }
    }

    fn flush_events(&self) {
        if matches!(self.options.execution_mode, ExecutionMode::Lockstep) {
            let buffered = std::mem::take(&mut *self.event_buffer.lock().unwrap());
            for event in buffered {
                self.events.send(event).ok();
            }
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().unwrap()
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state
    }

    /// Seed the inbound queue directly, used when restoring from a
    /// checkpoint (bypassing the edge-routing `enqueue_input` goes through,
    /// since these envelopes were already routed before the checkpoint).
    pub fn restore_queue(&self, queued: HashMap<ExecutorId, Vec<MessageEnvelope>>) {
        *self.queue.lock().unwrap() = queued;
        let has_pending = !self.queue.lock().unwrap().is_empty();
        *self.status.lock().unwrap() = if has_pending {
            RunStatus::Running
        } else if self.coordinator.has_outstanding() {
            RunStatus::PendingRequests
        } else {
            RunStatus::Idle
        };
    }

    pub fn restore_step(&self, step: u64) {
        self.step.store(step, Ordering::SeqCst);
    }

    /// Re-materialize each listed executor and, for those with a recorded
    /// snapshot, hand it back via [`Executor::on_checkpoint_restored`].
    pub async fn restore_executor_snapshots(
        &self,
        instantiated_ids: &[String],
        snapshots: HashMap<String, WireValue>,
    ) {
        for id_str in instantiated_ids {
            let id = ExecutorId::new(id_str.clone());
            if !self.workflow.bindings.contains_key(&id) {
                continue;
            }
            let executor = self.instantiate(&id);
            if let Some(wire) = snapshots.get(id_str) {
                let snapshot =
                    PortableValue::from_json(wire.payload.clone(), TypeId::named(wire.type_id.clone()));
                executor.on_checkpoint_restored(snapshot).await;
            }
        }
    }

    pub fn restore_pending_requests(
        &self,
        pending: HashMap<RequestId, crate::coordinator::PendingRequest>,
    ) {
        self.coordinator.restore(pending);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Seed the inbound queue for the start executor. Does not advance the
    /// step loop; call [`Self::run_to_next_halt`] to drive it.
    pub fn enqueue_input(&self, message: PortableValue, declared_type: TypeId) {
        let envelope = MessageEnvelope::external(
            message,
            declared_type,
            self.workflow.start_executor_id.clone(),
        );
        self.queue
            .lock()
            .unwrap()
            .entry(self.workflow.start_executor_id.clone())
            .or_default()
            .push(envelope);
        *self.status.lock().unwrap() = RunStatus::Running;
    }

    /// Post a response to a previously emitted external request; re-injects
    /// the matched value through the port's outgoing edges for the *next*
    /// superstep, per §4.6's "same rule as any other send".
    pub fn post_response(&self, response: ExternalResponse) -> Result<()> {
        let port = self
            .workflow
            .ports
            .get(&response.port_id)
            .ok_or_else(|| WorkflowError::UnknownRequest(response.request_id.clone()))?;
        let matched = self
            .coordinator
            .post_response(response, port.allow_wrapped())?;
        let port_executor_id = ExecutorId::new(matched.port_id.as_str());
        let response_type = port.port_info().response_type;
        self.route_and_enqueue(&port_executor_id, matched.value, response_type)?;
        if self.status() == RunStatus::PendingRequests && !self.coordinator.has_outstanding() {
            *self.status.lock().unwrap() = RunStatus::Running;
        }
        Ok(())
    }

    fn route_and_enqueue(
        &self,
        from: &ExecutorId,
        value: PortableValue,
        declared_type: TypeId,
    ) -> Result<()> {
        let mut next: HashMap<ExecutorId, Vec<MessageEnvelope>> = HashMap::new();
        for edge in self.workflow.edges_from(from) {
            let envelopes = edge.route(from, value.clone(), declared_type.clone())?;
            for envelope in envelopes {
                if let Some(target) = envelope.target_id.clone() {
                    next.entry(target).or_default().push(envelope);
                }
            }
        }
        let mut queue = self.queue.lock().unwrap();
        for (target, mut envelopes) in next {
            queue.entry(target).or_default().append(&mut envelopes);
        }
        Ok(())
    }

    fn instantiate(&self, id: &ExecutorId) -> Arc<dyn crate::executor::Executor> {
        let mut instantiated = self.instantiated.lock().unwrap();
        if let Some(existing) = instantiated.get(id) {
            return existing.clone();
        }
        let binding = &self.workflow.bindings[id];
        let executor = binding.instantiate(&self.run_id);
        instantiated.insert(id.clone(), executor.clone());
        executor
    }

    /// Runs supersteps until the queue drains (entering `Idle` or
    /// `PendingRequests`), a failure occurs, cancellation is observed, or an
    /// executor requests a graceful halt.
    pub async fn run_to_next_halt(&self) -> Result<RunStatus> {
        loop {
            if self.is_cancelled() {
                *self.status.lock().unwrap() = RunStatus::Cancelled;
                return Ok(RunStatus::Cancelled);
            }
            if self.halted.load(Ordering::SeqCst) {
                *self.status.lock().unwrap() = RunStatus::Completed;
                return Ok(RunStatus::Completed);
            }
            let snapshot: HashMap<ExecutorId, Vec<MessageEnvelope>> =
                std::mem::take(&mut *self.queue.lock().unwrap());
            if snapshot.is_empty() {
                break;
            }
            match self.run_superstep(snapshot).await {
                Ok(()) => {}
                Err(err) => {
                    *self.status.lock().unwrap() = RunStatus::Failed;
                    return Err(err);
                }
            }
            if self.is_cancelled() {
                *self.status.lock().unwrap() = RunStatus::Cancelled;
                return Ok(RunStatus::Cancelled);
            }
            if self.halted.load(Ordering::SeqCst) {
                *self.status.lock().unwrap() = RunStatus::Completed;
                return Ok(RunStatus::Completed);
            }
        }
        let final_status = if self.coordinator.has_outstanding() {
            RunStatus::PendingRequests
        } else {
            RunStatus::Idle
        };
        *self.status.lock().unwrap() = final_status;
        Ok(final_status)
    }

    async fn run_superstep(&self, snapshot: HashMap<ExecutorId, Vec<MessageEnvelope>>) -> Result<()> {
        let step = self.step.load(Ordering::SeqCst);
        let span = tracing::info_span!("superstep", run_id = %self.run_id, step);
        let _entered = span.enter();

        let mut activated = Vec::new();
        let mut newly_instantiated = Vec::new();
        let mut next_queue: HashMap<ExecutorId, Vec<MessageEnvelope>> = HashMap::new();
        let mut executor_targets = Vec::new();

        for (target, envelopes) in snapshot {
            if self.workflow.ports.contains_key(&PortId::new(target.as_str())) {
                self.handle_port_target(&target, envelopes)?;
                activated.push(target);
            } else {
                executor_targets.push((target, envelopes));
            }
        }

        let concurrent = self.options.allow_concurrent && executor_targets.len() > 1;
        let results = if concurrent {
            tracing::debug!(count = executor_targets.len(), "dispatching activated executors concurrently");
            futures::future::join_all(
                executor_targets
                    .into_iter()
                    .map(|(target, envelopes)| self.run_executor_target(target, envelopes, step)),
            )
            .await
        } else {
            let mut out = Vec::with_capacity(executor_targets.len());
            for (target, envelopes) in executor_targets {
                out.push(self.run_executor_target(target, envelopes, step).await);
            }
            out
        };

        for result in results {
            let (target, was_new, sends) = result?;
            if was_new {
                newly_instantiated.push(target.clone());
            }
            activated.push(target);
            for (sink, mut envelopes) in sends {
                next_queue.entry(sink).or_default().append(&mut envelopes);
            }
        }

        let state_updated = self.state.commit();

        let mut merged_queue = self.queue.lock().unwrap();
        for (target, mut envelopes) in next_queue {
            merged_queue.entry(target).or_default().append(&mut envelopes);
        }
        let has_pending_messages = !merged_queue.is_empty();
        drop(merged_queue);

        let has_pending_requests = self.coordinator.has_outstanding();

        let checkpoint_step = if let Some(manager) = &self.options.checkpoint_manager {
            let instantiated_snapshot: Vec<(ExecutorId, Arc<dyn Executor>)> = self
                .instantiated
                .lock()
                .unwrap()
                .iter()
                .map(|(id, executor)| (id.clone(), executor.clone()))
                .collect();
            let mut executor_snapshots = HashMap::new();
            for (id, executor) in &instantiated_snapshot {
                if let Some(snapshot) = executor.on_checkpointing().await {
                    if let Some(payload) = snapshot.peek_json() {
                        executor_snapshots
                            .insert(id.to_string(), WireValue::new(snapshot.type_id().as_str(), payload));
                    } else {
                        tracing::warn!(
                            executor_id = %id,
                            "skipping non-JSON-representable executor snapshot at checkpoint time"
                        );
                    }
                }
            }
            let instantiated_ids: Vec<String> =
                instantiated_snapshot.iter().map(|(id, _)| id.to_string()).collect();
            let queued_snapshot = self.queue.lock().unwrap().clone_for_checkpoint();
            let pending_requests = self.coordinator.outstanding_snapshot();
            let checkpoint = build_checkpoint(
                self.run_id.as_str(),
                step as i64,
                &self.state,
                &self.workflow.edges,
                &queued_snapshot,
                instantiated_ids,
                &pending_requests,
                executor_snapshots,
            )?;
            manager
                .put(checkpoint, CheckpointMetadata {
                    source: workflow_checkpoint::CheckpointSource::Superstep,
                    step: step as i64,
                    written_at: Some(chrono::Utc::now()),
                })
                .await?;
            Some(step as i64)
        } else {
            None
        };

        self.emit_event(WorkflowEvent::SuperStepCompleted {
            run_id: self.run_id.clone(),
            step,
            activated_executors: activated,
            newly_instantiated,
            state_updated,
            has_pending_messages,
            has_pending_requests,
            checkpoint_step,
        });
        self.flush_events();

        self.step.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Dispatch every envelope queued for one executor, in order. Returns
    /// the target id, whether this was its first activation, and the sends
    /// it staged, so concurrent invocations of this method (one per target)
    /// can be joined and merged without interleaving shared state.
    async fn run_executor_target(
        &self,
        target: ExecutorId,
        envelopes: Vec<MessageEnvelope>,
        step: u64,
    ) -> Result<(ExecutorId, bool, HashMap<ExecutorId, Vec<MessageEnvelope>>)> {
        let was_known = self.instantiated.lock().unwrap().contains_key(&target);
        let executor = self.instantiate(&target);
        let mut local_queue: HashMap<ExecutorId, Vec<MessageEnvelope>> = HashMap::new();

        for envelope in envelopes {
            tracing::debug!(executor_id = %target, "dispatching envelope");
            self.emit_event(WorkflowEvent::ExecutorInvoked {
                run_id: self.run_id.clone(),
                step,
                executor_id: target.clone(),
            });

            let ctx = WorkflowContext::new(target.clone(), self.state.view(), &self.store);
            let routes = executor.routes();
            let handler = routes.resolve(&envelope.declared_type);
            let result = match handler {
                Some(handler) => handler(envelope.message.clone(), &ctx).await,
                None => {
                    self.emit_event(WorkflowEvent::WorkflowWarning {
                        run_id: self.run_id.clone(),
                        message: format!(
                            "executor {target} has no route for {} and no catch-all; dropping envelope",
                            envelope.declared_type
                        ),
                    });
                    Ok(None)
                }
            };

            let (outbox, staged_events, halt) = ctx.take_outbox();
            for event in staged_events {
                self.emit_event(event);
            }
            if let Some(reason) = halt {
                self.halted.store(true, Ordering::SeqCst);
                self.emit_event(WorkflowEvent::RequestHalt {
                    run_id: self.run_id.clone(),
                    executor_id: target.clone(),
                    reason,
                });
            }

            match result {
                Ok(maybe_return) => {
                    let mut sends = outbox;
                    let auto_send = executor.options().auto_send_message_handler_result_object;
                    if auto_send {
                        if let Some(value) = maybe_return {
                            sends.push(crate::executor::OutboundSend {
                                declared_type: value.type_id().clone(),
                                value,
                            });
                        }
                    }
                    for send in sends {
                        self.emit_send(&target, send, &mut local_queue)?;
                    }
                }
                Err(WorkflowError::Cancelled) => {
                    self.cancelled.store(true, Ordering::SeqCst);
                    return Ok((target, !was_known, local_queue));
                }
                Err(err) => {
                    self.emit_event(WorkflowEvent::ExecutorFailure {
                        run_id: self.run_id.clone(),
                        step,
                        executor_id: target.clone(),
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            }

            self.emit_event(WorkflowEvent::ExecutorCompleted {
                run_id: self.run_id.clone(),
                step,
                executor_id: target.clone(),
            });
        }

        Ok((target, !was_known, local_queue))
    }

    fn handle_port_target(
        &self,
        port_executor_id: &ExecutorId,
        envelopes: Vec<MessageEnvelope>,
    ) -> Result<()> {
        let port = &self.workflow.ports[&PortId::new(port_executor_id.as_str())];
        for envelope in envelopes {
            let request_id = RequestId::generate();
            let request = ExternalRequest {
                port_info: port.port_info(),
                request_id: request_id.clone(),
                data: envelope.message,
            };
            self.coordinator.record_request(&request);
            self.emit_event(WorkflowEvent::ExternalRequestRaised {
                run_id: self.run_id.clone(),
                port_id: port.port_info().port_id,
                request_id,
            });
        }
        Ok(())
    }

    fn emit_send(
        &self,
        from: &ExecutorId,
        send: crate::executor::OutboundSend,
        next_queue: &mut HashMap<ExecutorId, Vec<MessageEnvelope>>,
    ) -> Result<()> {
        for edge in self.workflow.edges_from(from) {
            let envelopes = edge.route(from, send.value.clone(), send.declared_type.clone())?;
            for envelope in envelopes {
                if let Some(target) = envelope.target_id.clone() {
                    next_queue.entry(target).or_default().push(envelope);
                }
            }
        }
        if self.workflow.output_executor_ids.contains(from) {
            if let Some(payload) = send.value.peek_json() {
                self.emit_event(WorkflowEvent::WorkflowOutput {
                    run_id: self.run_id.clone(),
                    executor_id: from.clone(),
                    value: payload,
                });
            }
        }
        Ok(())
    }
}

trait CloneForCheckpoint {
    fn clone_for_checkpoint(&self) -> HashMap<ExecutorId, Vec<MessageEnvelope>>;
}

impl CloneForCheckpoint for HashMap<ExecutorId, Vec<MessageEnvelope>> {
    fn clone_for_checkpoint(&self) -> HashMap<ExecutorId, Vec<MessageEnvelope>> {
        self.iter()
            .map(|(k, v)| {
                let cloned = v
                    .iter()
                    .map(|e| MessageEnvelope {
                        message: e.message.clone(),
                        declared_type: e.declared_type.clone(),
                        source_id: e.source_id.clone(),
                        target_id: e.target_id.clone(),
                        trace_context: e.trace_context.clone(),
                    })
                    .collect();
                (k.clone(), cloned)
            })
            .collect()
    }
}
