//! Bridges the scheduler's in-memory runtime state to the
//! [`workflow_checkpoint`] wire format. `workflow-core` depends on
//! `workflow-checkpoint` for the trait and wire types; the wire types never
//! depend back on this crate's in-memory types (`PortableValue`, `ScopeId`).

use crate::edge::Edge;
use crate::envelope::MessageEnvelope;
use crate::id::{EdgeId, ExecutorId, RequestId, ScopeId, TypeId};
use crate::portable::PortableValue;
use crate::state::StateManager;
use std::collections::HashMap;
use workflow_checkpoint::{
    Checkpoint, EdgeStateEntry, OutstandingRequest, QueuedEnvelope, StateEntry, WireValue,
};

/// Flatten committed state into the wire format. Only JSON-representable
/// values round-trip; an eager value with no JSON view is skipped with a
/// warning (callers should prefer `PortableValue::delayed`/`from_json` for
/// anything meant to survive a checkpoint).
pub fn export_state_entries(state: &StateManager) -> crate::error::Result<Vec<StateEntry>> {
    let snapshot = state.export_state()?;
    let mut entries = Vec::with_capacity(snapshot.len());
    for ((scope, key), value) in snapshot {
        let Some(payload) = value.peek_json() else {
            tracing::warn!(
                executor_id = %scope.executor_id,
                key = %key,
                "skipping non-JSON-representable value at checkpoint time"
            );
            continue;
        };
        entries.push(StateEntry {
            executor_id: scope.executor_id.to_string(),
            scope_name: scope.scope_name.clone(),
            key,
            value: WireValue::new(value.type_id().as_str(), payload),
        });
    }
    Ok(entries)
}

pub fn import_state_entries(entries: Vec<StateEntry>) -> HashMap<(ScopeId, String), PortableValue> {
    entries
        .into_iter()
        .map(|entry| {
            let scope = ScopeId {
                executor_id: ExecutorId::new(entry.executor_id),
                scope_name: entry.scope_name,
            };
            let value = PortableValue::from_json(entry.value.payload, TypeId::named(entry.value.type_id));
            ((scope, entry.key), value)
        })
        .collect()
}

pub fn export_edge_state(edges: &HashMap<EdgeId, Edge>) -> Vec<EdgeStateEntry> {
    edges
        .values()
        .filter_map(|edge| edge.export_state())
        .filter_map(|snapshot| {
            let payload = serde_json::to_value(
                snapshot
                    .buffers
                    .iter()
                    .map(|(id, buf)| {
                        let values: Vec<serde_json::Value> =
                            buf.iter().filter_map(|v| v.peek_json()).collect();
                        (id.to_string(), values)
                    })
                    .collect::<HashMap<String, Vec<serde_json::Value>>>(),
            )
            .ok()?;
            Some(EdgeStateEntry {
                edge_id: snapshot.edge_id.to_string(),
                value: WireValue::new("fan_in_buffers", payload),
            })
        })
        .collect()
}

pub fn import_edge_state(edges: &HashMap<EdgeId, Edge>, entries: Vec<EdgeStateEntry>) {
    for entry in entries {
        let Some(edge) = edges.get(&EdgeId::new(entry.edge_id.clone())) else {
            continue;
        };
        let Ok(raw) = serde_json::from_value::<HashMap<String, Vec<serde_json::Value>>>(entry.value.payload)
        else {
            continue;
        };
        let buffers = raw
            .into_iter()
            .map(|(id, values)| {
                let queue = values
                    .into_iter()
                    .map(|v| PortableValue::from_json(v, TypeId::named("unknown")))
                    .collect();
                (ExecutorId::new(id), queue)
            })
            .collect();
        edge.import_state(crate::edge::FanInSnapshot {
            edge_id: EdgeId::new(entry.edge_id),
            buffers,
        });
    }
}

pub fn export_queued_envelopes(
    by_target: &HashMap<ExecutorId, Vec<MessageEnvelope>>,
) -> HashMap<String, Vec<QueuedEnvelope>> {
    by_target
        .iter()
        .map(|(target, envelopes)| {
            let queued = envelopes
                .iter()
                .filter_map(|env| {
                    let payload = env.message.peek_json()?;
                    Some(QueuedEnvelope {
                        message_type_id: env.declared_type.as_str().to_string(),
                        payload,
                        source_id: env.source_id.as_ref().map(|s| s.to_string()),
                        declared_type_id: Some(env.declared_type.as_str().to_string()),
                        target_id: env.target_id.as_ref().map(|t| t.to_string()),
                        trace_context: env.trace_context.clone(),
                    })
                })
                .collect();
            (target.to_string(), queued)
        })
        .collect()
}

pub fn import_queued_envelopes(
    entries: HashMap<String, Vec<QueuedEnvelope>>,
) -> HashMap<ExecutorId, Vec<MessageEnvelope>> {
    entries
        .into_iter()
        .map(|(target, queued)| {
            let envelopes = queued
                .into_iter()
                .map(|q| MessageEnvelope {
                    message: PortableValue::from_json(q.payload, TypeId::named(q.message_type_id.clone())),
                    declared_type: TypeId::named(q.declared_type_id.unwrap_or(q.message_type_id)),
                    source_id: q.source_id.map(ExecutorId::new),
                    target_id: q.target_id.map(ExecutorId::new),
                    trace_context: q.trace_context,
                })
                .collect();
            (ExecutorId::new(target), envelopes)
        })
        .collect()
}

pub fn import_outstanding_requests(
    entries: Vec<OutstandingRequest>,
) -> HashMap<RequestId, crate::coordinator::PendingRequest> {
    entries
        .into_iter()
        .map(|entry| {
            let request_id = RequestId::new(entry.request_id);
            (
                request_id.clone(),
                crate::coordinator::PendingRequest {
                    port_id: crate::id::PortId::new(entry.port_id),
                    request_type: TypeId::named(entry.request_type),
                    response_type: TypeId::named(entry.response_type),
                    request_id,
                    data: PortableValue::from_json(entry.data.payload, TypeId::named(entry.data.type_id)),
                },
            )
        })
        .collect()
}

pub fn export_outstanding_requests(
    pending: &HashMap<RequestId, crate::coordinator::PendingRequest>,
) -> Vec<OutstandingRequest> {
    pending
        .values()
        .filter_map(|req| {
            let payload = req.data.peek_json()?;
            Some(OutstandingRequest {
                port_id: req.port_id.to_string(),
                request_type: req.request_type.as_str().to_string(),
                response_type: req.response_type.as_str().to_string(),
                request_id: req.request_id.to_string(),
                data: WireValue::new(req.data.type_id().as_str(), payload),
            })
        })
        .collect()
}

/// Assemble a full checkpoint from a consistent snapshot of runtime state.
/// Must be called between supersteps, after `StateManager::commit`.
#[allow(clippy::too_many_arguments)]
pub fn build_checkpoint(
    run_id: &str,
    step: i64,
    state: &StateManager,
    edges: &HashMap<EdgeId, Edge>,
    queued: &HashMap<ExecutorId, Vec<MessageEnvelope>>,
    instantiated_executors: Vec<String>,
    pending_requests: &HashMap<RequestId, crate::coordinator::PendingRequest>,
    executor_snapshots: HashMap<String, WireValue>,
) -> crate::error::Result<Checkpoint> {
    Ok(Checkpoint {
        version: 1,
        run_id: run_id.to_string(),
        step,
        state_data: export_state_entries(state)?,
        edge_state_data: export_edge_state(edges),
        queued_envelopes: export_queued_envelopes(queued),
        instantiated_executors,
        outstanding_requests: export_outstanding_requests(pending_requests),
        executor_snapshots,
    })
}
