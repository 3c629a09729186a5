//! The workflow graph and its builder (§3, §4.1): an immutable-per-run set
//! of executor bindings, edges, and request ports, plus the designated
//! start executor and output executors.

use crate::binding::ExecutorBinding;
use crate::edge::{Edge, Predicate};
use crate::error::{Result, WorkflowError};
use crate::id::{EdgeId, ExecutorId, PortId, TypeId};
use crate::port::RequestPort;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A set of bindings, edges, and ports, immutable once built.
///
/// Invariant: every edge's source and sink ids resolve to either a binding
/// or a port; ids are unique within the workflow.
pub struct Workflow {
    pub bindings: HashMap<ExecutorId, ExecutorBinding>,
    pub edges: HashMap<EdgeId, Edge>,
    pub ports: HashMap<PortId, Arc<RequestPort>>,
    pub start_executor_id: ExecutorId,
    pub output_executor_ids: HashSet<ExecutorId>,
    pub allow_concurrent: bool,
}

impl Workflow {
    /// Executor ids reachable as an edge source, grouped so the scheduler
    /// can find every edge to run for a given emitting executor.
    pub fn edges_from(&self, source_id: &ExecutorId) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|edge| edge.source_ids().contains(source_id))
            .collect()
    }

    /// The accepted input types for the start executor, and whether it
    /// accepts everything via a catch-all. Materializes the start executor
    /// (factories may be invoked), per the embedding API's `describeProtocol`.
    pub fn describe_protocol(&self, run_id: &crate::id::RunId) -> (HashSet<TypeId>, bool) {
        let binding = &self.bindings[&self.start_executor_id];
        let executor = binding.instantiate(run_id);
        let routes = executor.routes();
        (
            routes.incoming_types().cloned().collect(),
            routes.accepts_all(),
        )
    }
}

pub struct WorkflowBuilder {
    bindings: HashMap<ExecutorId, ExecutorBinding>,
    edges: HashMap<EdgeId, Edge>,
    ports: HashMap<PortId, Arc<RequestPort>>,
    start_executor_id: Option<ExecutorId>,
    output_executor_ids: HashSet<ExecutorId>,
    allow_concurrent: bool,
    next_edge_ordinal: u64,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            edges: HashMap::new(),
            ports: HashMap::new(),
            start_executor_id: None,
            output_executor_ids: HashSet::new(),
            allow_concurrent: false,
            next_edge_ordinal: 0,
        }
    }

    fn fresh_edge_id(&mut self) -> EdgeId {
        let id = EdgeId::new(format!("edge-{}", self.next_edge_ordinal));
        self.next_edge_ordinal += 1;
        id
    }

    pub fn add_binding(mut self, binding: ExecutorBinding) -> Result<Self> {
        if self.bindings.contains_key(&binding.id) {
            return Err(WorkflowError::build(format!(
                "duplicate executor id: {}",
                binding.id
            )));
        }
        self.bindings.insert(binding.id.clone(), binding);
        Ok(self)
    }

    pub fn start_with(mut self, executor_id: ExecutorId) -> Self {
        self.start_executor_id = Some(executor_id);
        self
    }

    pub fn with_output_from(mut self, executor_ids: impl IntoIterator<Item = ExecutorId>) -> Self {
        self.output_executor_ids.extend(executor_ids);
        self
    }

    pub fn allow_concurrent(mut self, value: bool) -> Self {
        self.allow_concurrent = value;
        self
    }

    pub fn add_edge(mut self, source: ExecutorId, sink: ExecutorId) -> Self {
        let id = self.fresh_edge_id();
        self.edges.insert(id.clone(), Edge::direct(id, source, sink));
        self
    }

    pub fn add_edge_with_predicate(
        mut self,
        source: ExecutorId,
        sink: ExecutorId,
        predicate: Predicate,
    ) -> Self {
        let id = self.fresh_edge_id();
        self.edges.insert(
            id.clone(),
            Edge::direct_with_predicate(id, source, sink, predicate),
        );
        self
    }

    pub fn add_fan_out(mut self, source: ExecutorId, sinks: Vec<ExecutorId>) -> Self {
        let id = self.fresh_edge_id();
        self.edges.insert(id.clone(), Edge::fan_out(id, source, sinks));
        self
    }

    pub fn add_fan_in(mut self, sources: Vec<ExecutorId>, sink: ExecutorId) -> Self {
        let id = self.fresh_edge_id();
        self.edges.insert(id.clone(), Edge::fan_in(id, sources, sink));
        self
    }

    /// Reduced at build time to a fan-out whose partitioner evaluates the
    /// cases in declaration order, first match wins.
    pub fn add_switch(
        mut self,
        source: ExecutorId,
        sinks: Vec<ExecutorId>,
        cases: Vec<Predicate>,
        default_index: Option<usize>,
    ) -> Self {
        let id = self.fresh_edge_id();
        self.edges
            .insert(id.clone(), Edge::switch(id, source, sinks, cases, default_index));
        self
    }

    /// Creates a port plus the bidirectional pair of edges connecting it to
    /// `source` (request direction) and to `sink` (response direction).
    pub fn add_external_call(
        mut self,
        source: ExecutorId,
        port_id: PortId,
        sink: ExecutorId,
        request_type: TypeId,
        response_type: TypeId,
        allow_wrapped: bool,
    ) -> Self {
        let port = Arc::new(RequestPort::new(
            port_id.clone(),
            request_type,
            response_type,
            allow_wrapped,
        ));
        let port_executor_id = ExecutorId::new(port_id.as_str());
        self.ports.insert(port_id, port);

        let to_port = self.fresh_edge_id();
        self.edges.insert(
            to_port.clone(),
            Edge::direct(to_port, source, port_executor_id.clone()),
        );
        let from_port = self.fresh_edge_id();
        self.edges.insert(
            from_port.clone(),
            Edge::direct(from_port, port_executor_id, sink),
        );
        self
    }

    /// Pre-build structural check: no duplicate ids across bindings and
    /// ports, at least one start, every edge endpoint resolves, fan-in
    /// sources are non-empty.
    pub fn validate(&self) -> Result<()> {
        let start_id = self
            .start_executor_id
            .as_ref()
            .ok_or_else(|| WorkflowError::build("no start executor declared"))?;

        let mut known_ids: HashSet<&ExecutorId> = self.bindings.keys().collect();
        for port_id in self.ports.keys() {
            let as_executor = ExecutorId::new(port_id.as_str());
            if known_ids.contains(&as_executor) {
                return Err(WorkflowError::build(format!(
                    "port id collides with executor id: {port_id}"
                )));
            }
        }
        // Ports double as executors for routing purposes.
        let port_executor_ids: Vec<ExecutorId> = self
            .ports
            .keys()
            .map(|p| ExecutorId::new(p.as_str()))
            .collect();
        for id in &port_executor_ids {
            known_ids.insert(id);
        }

        if !known_ids.contains(start_id) {
            return Err(WorkflowError::build(format!(
                "start executor {start_id} is not a known binding or port"
            )));
        }

        for edge in self.edges.values() {
            match &edge.kind {
                crate::edge::EdgeKind::Direct {
                    source_id, sink_id, ..
                } => {
                    self.check_known(&known_ids, source_id)?;
                    self.check_known(&known_ids, sink_id)?;
                }
                crate::edge::EdgeKind::FanOut {
                    source_id, sink_ids, ..
                } => {
                    self.check_known(&known_ids, source_id)?;
                    for sink in sink_ids {
                        self.check_known(&known_ids, sink)?;
                    }
                }
                crate::edge::EdgeKind::FanIn {
                    source_ids, sink_id, ..
                } => {
                    if source_ids.is_empty() {
                        return Err(WorkflowError::build(format!(
                            "fan-in edge {} has no sources",
                            edge.id
                        )));
                    }
                    for source in source_ids {
                        self.check_known(&known_ids, source)?;
                    }
                    self.check_known(&known_ids, sink_id)?;
                }
            }
        }

        for id in &self.output_executor_ids {
            self.check_known(&known_ids, id)?;
        }

        Ok(())
    }

    fn check_known(&self, known: &HashSet<&ExecutorId>, id: &ExecutorId) -> Result<()> {
        if known.contains(id) {
            Ok(())
        } else {
            Err(WorkflowError::build(format!(
                "edge endpoint {id} is not a known binding or port"
            )))
        }
    }

    pub fn build(self) -> Result<Workflow> {
        self.validate()?;
        Ok(Workflow {
            bindings: self.bindings,
            edges: self.edges,
            ports: self.ports,
            start_executor_id: self.start_executor_id.unwrap(),
            output_executor_ids: self.output_executor_ids,
            allow_concurrent: self.allow_concurrent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Executor, RouteTable};
    use async_trait::async_trait;

    struct Noop(ExecutorId);

    #[async_trait]
    impl Executor for Noop {
        fn id(&self) -> &ExecutorId {
            &self.0
        }

        fn routes(&self) -> RouteTable {
            RouteTable::builder().build()
        }
    }

    fn binding(name: &str) -> ExecutorBinding {
        let id = ExecutorId::new(name);
        let cloned = id.clone();
        ExecutorBinding::fresh(id, "noop", move |_| Arc::new(Noop(cloned.clone())))
    }

    #[test]
    fn missing_start_executor_is_build_error() {
        let result = WorkflowBuilder::new().add_binding(binding("A")).unwrap().build();
        assert!(result.is_err());
    }

    #[test]
    fn dangling_edge_sink_is_build_error() {
        let result = WorkflowBuilder::new()
            .add_binding(binding("A"))
            .unwrap()
            .start_with(ExecutorId::new("A"))
            .add_edge(ExecutorId::new("A"), ExecutorId::new("ghost"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn fan_in_with_no_sources_is_build_error() {
        let result = WorkflowBuilder::new()
            .add_binding(binding("A"))
            .unwrap()
            .add_binding(binding("D"))
            .unwrap()
            .start_with(ExecutorId::new("A"))
            .add_fan_in(Vec::new(), ExecutorId::new("D"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_binding_ids_are_rejected() {
        let result = WorkflowBuilder::new().add_binding(binding("A")).unwrap().add_binding(binding("A"));
        assert!(result.is_err());
    }

    #[test]
    fn well_formed_graph_builds() {
        let result = WorkflowBuilder::new()
            .add_binding(binding("A"))
            .unwrap()
            .add_binding(binding("B"))
            .unwrap()
            .start_with(ExecutorId::new("A"))
            .add_edge(ExecutorId::new("A"), ExecutorId::new("B"))
            .build();
        assert!(result.is_ok());
    }
}
