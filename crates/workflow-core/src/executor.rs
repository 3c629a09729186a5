//! The executor contract (§4.2): a typed dispatch table resolved in O(1),
//! an optional catch-all, and the [`WorkflowContext`] capability handed to
//! every handler invocation.

use crate::config::ExecutorOptions;
use crate::envelope::ExternalResponse;
use crate::error::Result;
use crate::id::{ExecutorId, ScopeId, TypeId};
use crate::portable::PortableValue;
use crate::state::StateView;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed async handler: `(PortableValue, &WorkflowContext) -> Result<Option<PortableValue>>`.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<PortableValue>>> + Send + 'a>>;
pub type Handler = Arc<
    dyn for<'a> Fn(PortableValue, &'a WorkflowContext) -> HandlerFuture<'a> + Send + Sync,
>;

/// A typed dispatch table: one entry per declared incoming type, plus an
/// optional catch-all and an optional handler for re-injected external
/// responses.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<TypeId, Handler>,
    catch_all: Option<Handler>,
    response_handler: Option<Handler>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn incoming_types(&self) -> impl Iterator<Item = &TypeId> {
        self.routes.keys()
    }

    pub fn accepts_all(&self) -> bool {
        self.catch_all.is_some()
    }

    /// Resolve the handler for a declared type, preferring a typed route
    /// over the catch-all (testable property 6).
    pub fn resolve(&self, type_id: &TypeId) -> Option<Handler> {
        self.routes
            .get(type_id)
            .cloned()
            .or_else(|| self.catch_all.clone())
    }

    pub fn response_handler(&self) -> Option<Handler> {
        self.response_handler.clone()
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    routes: HashMap<TypeId, Handler>,
    catch_all: Option<Handler>,
    response_handler: Option<Handler>,
}

impl RouteTableBuilder {
    pub fn on_type<F>(mut self, type_id: TypeId, handler: F) -> Self
    where
        F: for<'a> Fn(PortableValue, &'a WorkflowContext) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.routes.insert(type_id, Arc::new(handler));
        self
    }

    pub fn catch_all<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(PortableValue, &'a WorkflowContext) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.catch_all = Some(Arc::new(handler));
        self
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(PortableValue, &'a WorkflowContext) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.response_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
            catch_all: self.catch_all,
            response_handler: self.response_handler,
        }
    }
}

/// A message-processing node. Owns no persistent state of its own beyond
/// what it stores through the [`WorkflowContext`] — any in-memory fields
/// must round-trip via [`Executor::on_checkpointing`]/[`Executor::on_checkpoint_restored`].
#[async_trait]
pub trait Executor: Send + Sync {
    fn id(&self) -> &ExecutorId;

    fn routes(&self) -> RouteTable;

    fn options(&self) -> ExecutorOptions {
        ExecutorOptions::default()
    }

    /// Called by the state manager right before a checkpoint is written, so
    /// the executor can contribute an opaque snapshot of its own in-memory
    /// fields.
    async fn on_checkpointing(&self) -> Option<PortableValue> {
        None
    }

    /// Called right after the executor is re-materialized from a checkpoint,
    /// with the snapshot it produced at `on_checkpointing` time.
    async fn on_checkpoint_restored(&self, _snapshot: PortableValue) {}
}

/// Invokes a port's response handler when a matching [`ExternalResponse`]
/// is re-injected. Ports implement this in addition to [`Executor`].
#[async_trait]
pub trait RespondsToExternal: Executor {
    async fn handle_response(
        &self,
        response: ExternalResponse,
        ctx: &WorkflowContext,
    ) -> Result<Option<PortableValue>>;
}

/// The narrow capability object passed by value to every handler
/// invocation. Replaces the bidirectional scheduler/executor/context
/// ownership cycle with a single owner (the scheduler).
pub struct WorkflowContext<'a> {
    pub(crate) executor_id: ExecutorId,
    pub(crate) state: &'a StateView,
    pub(crate) outbox: parking_lot::Mutex<Vec<OutboundSend>>,
    pub(crate) events: parking_lot::Mutex<Vec<crate::events::WorkflowEvent>>,
    pub(crate) halt: parking_lot::Mutex<Option<Option<String>>>,
    pub(crate) store: &'a crate::store::Store,
}

/// A value a handler asked to send, staged until the handler returns.
pub struct OutboundSend {
    pub value: PortableValue,
    pub declared_type: TypeId,
}

impl<'a> WorkflowContext<'a> {
    pub fn new(
        executor_id: ExecutorId,
        state: &'a StateView,
        store: &'a crate::store::Store,
    ) -> Self {
        Self {
            executor_id,
            state,
            outbox: parking_lot::Mutex::new(Vec::new()),
            events: parking_lot::Mutex::new(Vec::new()),
            halt: parking_lot::Mutex::new(None),
            store,
        }
    }

    pub fn executor_id(&self) -> &ExecutorId {
        &self.executor_id
    }

    /// Stage an outbound message. Staged sends are collected after the
    /// handler returns and routed through the matching edge runners.
    pub fn send_message(&self, value: PortableValue, declared_type: TypeId) {
        self.outbox.lock().push(OutboundSend {
            value,
            declared_type,
        });
    }

    pub fn add_event(&self, event: crate::events::WorkflowEvent) {
        self.events.lock().push(event);
    }

    /// Read the merged staged-plus-committed view for a key in this
    /// executor's default scope.
    pub fn read_state(&self, key: &str) -> Option<PortableValue> {
        self.state
            .read(&ScopeId::new(self.executor_id.clone()), key)
    }

    pub fn read_state_scoped(&self, scope_name: &str, key: &str) -> Option<PortableValue> {
        self.state.read(
            &ScopeId::named(self.executor_id.clone(), scope_name.to_string()),
            key,
        )
    }

    /// If neither staged nor committed has the key, materializes `factory`
    /// once and stages the result as an update. The only path that may
    /// write during a read.
    pub fn read_or_init_state(
        &self,
        key: &str,
        factory: impl FnOnce() -> PortableValue,
    ) -> PortableValue {
        let scope = ScopeId::new(self.executor_id.clone());
        if let Some(existing) = self.state.read(&scope, key) {
            return existing;
        }
        let value = factory();
        self.state.queue_update(scope, key.to_string(), value.clone());
        value
    }

    pub fn queue_state_update(&self, key: &str, value: PortableValue) {
        self.state
            .queue_update(ScopeId::new(self.executor_id.clone()), key.to_string(), value);
    }

    pub fn queue_state_update_scoped(&self, scope_name: &str, key: &str, value: PortableValue) {
        self.state.queue_update(
            ScopeId::named(self.executor_id.clone(), scope_name.to_string()),
            key.to_string(),
            value,
        );
    }

    pub fn queue_state_reset(&self, scope_name: Option<&str>) {
        let scope = match scope_name {
            Some(name) => ScopeId::named(self.executor_id.clone(), name.to_string()),
            None => ScopeId::new(self.executor_id.clone()),
        };
        self.state.queue_reset(scope);
    }

    /// The ambient, cross-run store side-channel (not the superstep-scoped
    /// state manager).
    pub fn store(&self) -> &crate::store::Store {
        self.store
    }

    /// Ask the run to stop gracefully once the current superstep finishes,
    /// rather than failing. Surfaced as `WorkflowEvent::RequestHalt`; the run
    /// transitions to `RunStatus::Completed`.
    pub fn request_halt(&self, reason: Option<String>) {
        *self.halt.lock() = Some(reason);
    }

    pub(crate) fn take_outbox(
        self,
    ) -> (
        Vec<OutboundSend>,
        Vec<crate::events::WorkflowEvent>,
        Option<Option<String>>,
    ) {
        (self.outbox.into_inner(), self.events.into_inner(), self.halt.into_inner())
    }
}
