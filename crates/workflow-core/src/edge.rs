//! Edge runners (§4.4): per-edge delivery logic translating "executor X
//! emitted value V" into zero or more envelopes for the next superstep.

use crate::envelope::MessageEnvelope;
use crate::error::{Result, WorkflowError};
use crate::id::{EdgeId, ExecutorId, TypeId};
use crate::portable::PortableValue;
use std::collections::{HashMap, VecDeque};

/// A pure predicate over the logical (unwrapped) message.
pub type Predicate = std::sync::Arc<dyn Fn(&PortableValue) -> bool + Send + Sync>;
/// Deterministic for a given `(value, len)` — non-determinism breaks
/// checkpoint equivalence.
pub type Partitioner = std::sync::Arc<dyn Fn(&PortableValue, usize) -> Vec<usize> + Send + Sync>;

/// Build a [`Predicate`] that decodes the envelope to `T` before testing it,
/// so switch/fan-out cases see the logical typed message instead of the raw
/// [`PortableValue`]. A value that fails to decode as `T` does not match
/// (`false`), the same outcome as a predicate that evaluates false.
pub fn typed_predicate<T, F>(f: F) -> Predicate
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    std::sync::Arc::new(move |value: &PortableValue| {
        value.as_ref::<T>().map(|typed| f(&typed)).unwrap_or(false)
    })
}

pub enum EdgeKind {
    Direct {
        source_id: ExecutorId,
        sink_id: ExecutorId,
        predicate: Option<Predicate>,
    },
    FanOut {
        source_id: ExecutorId,
        sink_ids: Vec<ExecutorId>,
        partitioner: Option<Partitioner>,
    },
    /// Stateful: buffers one message per source; emits an aggregate list
    /// once every source has delivered at least once.
    FanIn {
        source_ids: Vec<ExecutorId>,
        sink_id: ExecutorId,
        buffers: std::sync::Mutex<HashMap<ExecutorId, VecDeque<PortableValue>>>,
    },
}

pub struct Edge {
    pub id: EdgeId,
    pub label: Option<String>,
    pub kind: EdgeKind,
}

/// One fan-in buffer's contents, for checkpoint export/import.
pub struct FanInSnapshot {
    pub edge_id: EdgeId,
    pub buffers: HashMap<ExecutorId, VecDeque<PortableValue>>,
}

impl Edge {
    pub fn direct(id: EdgeId, source_id: ExecutorId, sink_id: ExecutorId) -> Self {
        Self {
            id,
            label: None,
            kind: EdgeKind::Direct {
                source_id,
                sink_id,
                predicate: None,
            },
        }
    }

    pub fn direct_with_predicate(
        id: EdgeId,
        source_id: ExecutorId,
        sink_id: ExecutorId,
        predicate: Predicate,
    ) -> Self {
        Self {
            id,
            label: None,
            kind: EdgeKind::Direct {
                source_id,
                sink_id,
                predicate: Some(predicate),
            },
        }
    }

    pub fn fan_out(id: EdgeId, source_id: ExecutorId, sink_ids: Vec<ExecutorId>) -> Self {
        Self {
            id,
            label: None,
            kind: EdgeKind::FanOut {
                source_id,
                sink_ids,
                partitioner: None,
            },
        }
    }

    pub fn fan_out_with_partitioner(
        id: EdgeId,
        source_id: ExecutorId,
        sink_ids: Vec<ExecutorId>,
        partitioner: Partitioner,
    ) -> Self {
        Self {
            id,
            label: None,
            kind: EdgeKind::FanOut {
                source_id,
                sink_ids,
                partitioner: Some(partitioner),
            },
        }
    }

    /// A switch is a fan-out whose partitioner evaluates an ordered list of
    /// case predicates and selects the first matching sink (or a default),
    /// reduced at build time per §4.4.
    pub fn switch(
        id: EdgeId,
        source_id: ExecutorId,
        sink_ids: Vec<ExecutorId>,
        cases: Vec<Predicate>,
        default_index: Option<usize>,
    ) -> Self {
        let partitioner: Partitioner = std::sync::Arc::new(move |value, _len| {
            for (i, predicate) in cases.iter().enumerate() {
                if predicate(value) {
                    return vec![i];
                }
            }
            default_index.map(|i| vec![i]).unwrap_or_default()
        });
        Self::fan_out_with_partitioner(id, source_id, sink_ids, partitioner)
    }

    pub fn fan_in(id: EdgeId, source_ids: Vec<ExecutorId>, sink_id: ExecutorId) -> Self {
        Self {
            id,
            label: None,
            kind: EdgeKind::FanIn {
                source_ids,
                sink_id,
                buffers: std::sync::Mutex::new(HashMap::new()),
            },
        }
    }

    pub fn source_ids(&self) -> Vec<ExecutorId> {
        match &self.kind {
            EdgeKind::Direct { source_id, .. } => vec![source_id.clone()],
            EdgeKind::FanOut { source_id, .. } => vec![source_id.clone()],
            EdgeKind::FanIn { source_ids, .. } => source_ids.clone(),
        }
    }

    /// Translate one emitted value from `from` into zero or more envelopes
    /// for the next superstep.
    pub fn route(
        &self,
        from: &ExecutorId,
        value: PortableValue,
        declared_type: TypeId,
    ) -> Result<Vec<MessageEnvelope>> {
        match &self.kind {
            EdgeKind::Direct {
                sink_id, predicate, ..
            } => {
                let matches = predicate.as_ref().map(|p| p(&value)).unwrap_or(true);
                if matches {
                    Ok(vec![MessageEnvelope::from_executor(
                        value,
                        declared_type,
                        from.clone(),
                        sink_id.clone(),
                    )])
                } else {
                    Ok(Vec::new())
                }
            }
            EdgeKind::FanOut {
                sink_ids,
                partitioner,
                ..
            } => {
                let indices = match partitioner {
                    Some(p) => p(&value, sink_ids.len()),
                    None => (0..sink_ids.len()).collect(),
                };
                let mut envelopes = Vec::with_capacity(indices.len());
                for index in indices {
                    let sink_id = sink_ids.get(index).ok_or_else(|| {
                        WorkflowError::edge(
                            self.id.clone(),
                            format!("partitioner returned out-of-range index {index}"),
                        )
                    })?;
                    envelopes.push(MessageEnvelope::from_executor(
                        value.clone(),
                        declared_type.clone(),
                        from.clone(),
                        sink_id.clone(),
                    ));
                }
                Ok(envelopes)
            }
            EdgeKind::FanIn {
                source_ids,
                sink_id,
                buffers,
            } => {
                let mut guard = buffers.lock().unwrap();
                guard
                    .entry(from.clone())
                    .or_default()
                    .push_back(value);
                let ready = source_ids.iter().all(|id| {
                    guard.get(id).map(|q| !q.is_empty()).unwrap_or(false)
                });
                if !ready {
                    return Ok(Vec::new());
                }
                let mut aggregate = Vec::with_capacity(source_ids.len());
                for id in source_ids {
                    let popped = guard.get_mut(id).and_then(|q| q.pop_front()).ok_or_else(|| {
                        WorkflowError::edge(self.id.clone(), "fan-in buffer underrun")
                    })?;
                    aggregate.push(popped);
                }
                Ok(vec![MessageEnvelope::from_executor(
                    PortableValue::eager(aggregate, TypeId::named("fan_in_aggregate")),
                    TypeId::named("fan_in_aggregate"),
                    from.clone(),
                    sink_id.clone(),
                )])
            }
        }
    }

    /// Export this edge's stateful buffers, if it has any (fan-in only).
    pub fn export_state(&self) -> Option<FanInSnapshot> {
        match &self.kind {
            EdgeKind::FanIn { buffers, .. } => Some(FanInSnapshot {
                edge_id: self.id.clone(),
                buffers: buffers.lock().unwrap().clone(),
            }),
            _ => None,
        }
    }

    pub fn import_state(&self, snapshot: FanInSnapshot) {
        if let EdgeKind::FanIn { buffers, .. } = &self.kind {
            *buffers.lock().unwrap() = snapshot.buffers;
        }
    }
}

impl Clone for FanInSnapshot {
    fn clone(&self) -> Self {
        Self {
            edge_id: self.edge_id.clone(),
            buffers: self.buffers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pv(n: i64) -> PortableValue {
        PortableValue::of(n)
    }

    #[test]
    fn direct_edge_emits_one_envelope() {
        let edge = Edge::direct(EdgeId::new("e1"), ExecutorId::new("A"), ExecutorId::new("B"));
        let out = edge
            .route(&ExecutorId::new("A"), pv(1), TypeId::named("i64"))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target_id, Some(ExecutorId::new("B")));
    }

    #[test]
    fn fan_out_broadcast_hits_every_sink() {
        let edge = Edge::fan_out(
            EdgeId::new("e1"),
            ExecutorId::new("A"),
            vec![ExecutorId::new("B"), ExecutorId::new("C")],
        );
        let out = edge
            .route(&ExecutorId::new("A"), pv(42), TypeId::named("i64"))
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn fan_out_invalid_partition_index_is_edge_error() {
        let partitioner: Partitioner = std::sync::Arc::new(|_, _| vec![5]);
        let edge = Edge::fan_out_with_partitioner(
            EdgeId::new("e1"),
            ExecutorId::new("A"),
            vec![ExecutorId::new("B")],
            partitioner,
        );
        let err = edge.route(&ExecutorId::new("A"), pv(1), TypeId::named("i64"));
        assert!(matches!(err, Err(WorkflowError::Edge { .. })));
    }

    #[test]
    fn fan_in_waits_for_every_source_then_emits_ordered_list() {
        let edge = Edge::fan_in(
            EdgeId::new("e1"),
            vec![ExecutorId::new("B"), ExecutorId::new("C")],
            ExecutorId::new("D"),
        );
        let first = edge
            .route(&ExecutorId::new("B"), pv(84), TypeId::named("i64"))
            .unwrap();
        assert!(first.is_empty());
        let second = edge
            .route(&ExecutorId::new("C"), pv(43), TypeId::named("i64"))
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].declared_type, TypeId::named("fan_in_aggregate"));
    }

    #[test]
    fn fan_in_export_import_restores_partial_progress() {
        let edge = Edge::fan_in(
            EdgeId::new("e1"),
            vec![ExecutorId::new("B"), ExecutorId::new("C")],
            ExecutorId::new("D"),
        );
        edge.route(&ExecutorId::new("B"), pv(1), TypeId::named("i64"))
            .unwrap();
        let snapshot = edge.export_state().unwrap();

        let restored = Edge::fan_in(
            EdgeId::new("e1"),
            vec![ExecutorId::new("B"), ExecutorId::new("C")],
            ExecutorId::new("D"),
        );
        restored.import_state(snapshot);
        let out = restored
            .route(&ExecutorId::new("C"), pv(2), TypeId::named("i64"))
            .unwrap();
        assert_eq!(out.len(), 1);
    }
}
