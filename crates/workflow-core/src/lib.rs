//! # workflow-core
//!
//! An in-process, actor-style execution engine that runs directed graphs of
//! "executors" under a Pregel-style superstep scheduler, with fan-out/fan-in
//! edges, external request/response ports, and checkpoint/resume.
//!
//! The engine is deliberately narrow: it supplies the primitives concrete
//! agents, LLM clients, and orchestration policies (group chat, handoff,
//! Magentic managers) are built from — messages flowing along typed edges
//! between executors, batched into supersteps. It does not itself know what
//! an "agent" is.
//!
//! ## Building a workflow
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workflow_core::binding::ExecutorBinding;
//! use workflow_core::config::WorkflowOptions;
//! use workflow_core::graph::WorkflowBuilder;
//! use workflow_core::id::{ExecutorId, TypeId};
//! use workflow_core::portable::PortableValue;
//! use workflow_core::run::Run;
//!
//! # async fn demo(binding_a: ExecutorBinding, binding_b: ExecutorBinding) -> workflow_core::error::Result<()> {
//! let workflow = Arc::new(
//!     WorkflowBuilder::new()
//!         .add_binding(binding_a)?
//!         .add_binding(binding_b)?
//!         .start_with(ExecutorId::new("A"))
//!         .add_edge(ExecutorId::new("A"), ExecutorId::new("B"))
//!         .build()?,
//! );
//!
//! let run = Run::start(workflow, WorkflowOptions::default(), None);
//! run.enqueue(PortableValue::of("ping".to_string()), TypeId::of::<String>());
//! run.run_to_next_halt().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module map
//!
//! - [`id`] — the newtype identifiers threaded everywhere (`ExecutorId`,
//!   `EdgeId`, `TypeId`, `RunId`, `ScopeId`, ...).
//! - [`portable`] — [`portable::PortableValue`], the delayed-deserialization
//!   value carrier.
//! - [`envelope`] — [`envelope::MessageEnvelope`] and the external
//!   request/response pair.
//! - [`executor`] — the [`executor::Executor`] trait, its typed dispatch
//!   table, and the [`executor::WorkflowContext`] capability handed to
//!   handlers.
//! - [`edge`] — the direct/fan-out/fan-in edge runners.
//! - [`port`] — request ports, which double as executors at the run
//!   boundary.
//! - [`binding`] — how the graph obtains an executor instance per run.
//! - [`graph`] — [`graph::Workflow`] and its builder.
//! - [`state`] — the state manager: scoped, staged, per-superstep writes.
//! - [`store`] — an ambient cross-run key/value side-channel, not part of
//!   the checkpointed state model.
//! - [`checkpoint`] — conversions between in-memory runtime state and the
//!   `workflow-checkpoint` wire format.
//! - [`coordinator`] — the external request/response coordinator.
//! - [`scheduler`] — the superstep loop itself.
//! - [`run`] — the host-facing run handle and checkpoint-resume entry
//!   point.
//! - [`events`] — [`events::WorkflowEvent`], the typed event stream.
//! - [`config`] — [`config::WorkflowOptions`] and per-executor options.
//! - [`error`] — the crate-wide error taxonomy.

pub mod binding;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod edge;
pub mod envelope;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod id;
pub mod port;
pub mod portable;
pub mod run;
pub mod scheduler;
pub mod state;
pub mod store;

pub use error::{Result, WorkflowError};
