//! Executor bindings (§3): how the graph obtains an executor instance for
//! a given run, by factory or shared instance.

use crate::executor::Executor;
use crate::id::{ExecutorId, RunId};
use std::sync::Arc;

/// A factory invoked lazily, once per run, the first time a binding's
/// executor is needed (or eagerly for the start executor).
pub type ExecutorFactory = Arc<dyn Fn(&RunId) -> Arc<dyn Executor> + Send + Sync>;

/// A specification of how to obtain an executor instance.
///
/// A shared instance must either declare itself threadsafe for concurrent
/// runs (`supports_concurrent_shared_execution`) or be used in only one run
/// at a time; a non-resettable shared instance cannot be reused across runs
/// on the same workflow (see [`crate::graph::WorkflowBuilder::validate`]).
#[derive(Clone)]
pub struct ExecutorBinding {
    pub id: ExecutorId,
    pub executor_type: String,
    pub factory: ExecutorFactory,
    pub supports_concurrent_shared_execution: bool,
    pub supports_resetting: bool,
    pub is_shared_instance: bool,
}

impl ExecutorBinding {
    /// A binding backed by a fresh instance per run.
    pub fn fresh<F>(id: ExecutorId, executor_type: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&RunId) -> Arc<dyn Executor> + Send + Sync + 'static,
    {
        Self {
            id,
            executor_type: executor_type.into(),
            factory: Arc::new(factory),
            supports_concurrent_shared_execution: false,
            supports_resetting: true,
            is_shared_instance: false,
        }
    }

    /// A binding backed by one instance shared across runs.
    pub fn shared(
        id: ExecutorId,
        executor_type: impl Into<String>,
        instance: Arc<dyn Executor>,
        supports_concurrent_shared_execution: bool,
        supports_resetting: bool,
    ) -> Self {
        Self {
            id,
            executor_type: executor_type.into(),
            factory: Arc::new(move |_run_id| instance.clone()),
            supports_concurrent_shared_execution,
            supports_resetting,
            is_shared_instance: true,
        }
    }

    pub fn instantiate(&self, run_id: &RunId) -> Arc<dyn Executor> {
        (self.factory)(run_id)
    }
}
