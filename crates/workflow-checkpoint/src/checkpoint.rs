//! The checkpoint wire format.
//!
//! A [`Checkpoint`] is the serializable record a [`crate::CheckpointManager`]
//! persists after a superstep commits. It is intentionally decoupled from
//! `workflow-core`'s in-memory types (`PortableValue`, `ScopeId`, ...) so this
//! crate has no dependency on the engine crate — every value here is already
//! flattened to a `TypeId` tag plus a `serde_json::Value` payload, matching
//! the wire contract in the specification's external-interfaces section.
//!
//! Forward/backward compatibility rule: unknown fields are ignored by serde's
//! default (`deny_unknown_fields` is never set on these types); missing
//! scalar fields fall back to `#[serde(default)]`; `type_id` is authoritative
//! and must round-trip across restore.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value plus the logical type it was produced from, flattened for the
/// wire. Mirrors `PortableValue`'s `(TypeId, payload)` pair in `workflow-core`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireValue {
    pub type_id: String,
    pub payload: serde_json::Value,
}

impl WireValue {
    pub fn new(type_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            type_id: type_id.into(),
            payload,
        }
    }
}

/// One committed state cell: `(executorId, scope?, key) -> value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateEntry {
    pub executor_id: String,
    #[serde(default)]
    pub scope_name: Option<String>,
    pub key: String,
    pub value: WireValue,
}

/// One stateful edge runner's exported buffer (fan-in source buffers, in
/// particular).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeStateEntry {
    pub edge_id: String,
    pub value: WireValue,
}

/// A queued envelope scheduled for the *next* superstep, serialized per
/// the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedEnvelope {
    pub message_type_id: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub declared_type_id: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub trace_context: Option<serde_json::Value>,
}

/// An external request that had not yet been answered when the checkpoint
/// was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutstandingRequest {
    pub port_id: String,
    pub request_type: String,
    pub response_type: String,
    pub request_id: String,
    pub data: WireValue,
}

/// A complete, resumable snapshot of a run's runtime state.
///
/// Invariant: a checkpoint is only ever written between supersteps, after
/// the state manager has committed its staged writes for that step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Schema version tag, bumped whenever the wire shape changes in a way
    /// that is not purely additive.
    #[serde(default = "default_version")]
    pub version: u32,
    pub run_id: String,
    pub step: i64,
    pub state_data: Vec<StateEntry>,
    pub edge_state_data: Vec<EdgeStateEntry>,
    /// Envelopes queued for the *next* step, grouped by target executor id.
    pub queued_envelopes: HashMap<String, Vec<QueuedEnvelope>>,
    pub instantiated_executors: Vec<String>,
    pub outstanding_requests: Vec<OutstandingRequest>,
    /// Per-executor serialized snapshots from `onCheckpointing`.
    pub executor_snapshots: HashMap<String, WireValue>,
}

fn default_version() -> u32 {
    1
}

impl Checkpoint {
    pub fn new(run_id: impl Into<String>, step: i64) -> Self {
        Self {
            version: default_version(),
            run_id: run_id.into(),
            step,
            state_data: Vec::new(),
            edge_state_data: Vec::new(),
            queued_envelopes: HashMap::new(),
            instantiated_executors: Vec::new(),
            outstanding_requests: Vec::new(),
            executor_snapshots: HashMap::new(),
        }
    }
}

/// Identifies a specific checkpoint: which run, and which superstep.
///
/// Analogous to the teacher's `CheckpointConfig` (`thread_id` + `checkpoint_ts`),
/// renamed to this domain's run/step vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CheckpointConfig {
    pub run_id: String,
    /// `None` means "the latest checkpoint for this run".
    pub step: Option<i64>,
}

impl CheckpointConfig {
    pub fn latest(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            step: None,
        }
    }

    pub fn at_step(run_id: impl Into<String>, step: i64) -> Self {
        Self {
            run_id: run_id.into(),
            step: Some(step),
        }
    }
}

/// Metadata recorded alongside a checkpoint, describing why it was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    pub step: i64,
    #[serde(default)]
    pub written_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Why a checkpoint was written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    /// Automatic commit at the end of a superstep.
    #[default]
    Superstep,
    /// Taken explicitly by the host (e.g. before a risky external call).
    Manual,
}

/// A checkpoint plus its metadata and identifying config, as returned by
/// [`crate::CheckpointManager::get_tuple`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointTuple {
    pub config: CheckpointConfig,
    pub checkpoint: Checkpoint,
    pub metadata: CheckpointMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_round_trips_through_json() {
        let mut cp = Checkpoint::new("run-1", 2);
        cp.state_data.push(StateEntry {
            executor_id: "A".into(),
            scope_name: None,
            key: "count".into(),
            value: WireValue::new("i64", serde_json::json!(3)),
        });
        let bytes = serde_json::to_vec(&cp).unwrap();
        let restored: Checkpoint = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(cp, restored);
    }

    #[test]
    fn unknown_fields_are_ignored_on_restore() {
        let raw = serde_json::json!({
            "version": 1,
            "run_id": "run-1",
            "step": 0,
            "state_data": [],
            "edge_state_data": [],
            "queued_envelopes": {},
            "instantiated_executors": [],
            "outstanding_requests": [],
            "executor_snapshots": {},
            "from_a_future_version": true,
        });
        let cp: Checkpoint = serde_json::from_value(raw).unwrap();
        assert_eq!(cp.run_id, "run-1");
    }
}
