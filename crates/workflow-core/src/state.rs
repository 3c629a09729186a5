//! The state manager (§4.5): a logical map from `(scopeId, key)` to
//! [`PortableValue`], with staged writes committed atomically per superstep.

use crate::error::{Result, WorkflowError};
use crate::id::ScopeId;
use crate::portable::PortableValue;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Clone)]
enum PendingOp {
    Update(PortableValue),
    Reset,
}

/// One superstep's worth of staged writes, keyed by `(scope, key)`.
#[derive(Default)]
struct UpdateLog {
    updates: HashMap<(ScopeId, String), PendingOp>,
    /// Scopes staged for a full reset this step; a later per-key update in
    /// the same step still wins for that key (last-writer-wins within the
    /// step, per the concurrency model).
    reset_scopes: Vec<ScopeId>,
}

/// The read-side view handed to [`crate::executor::WorkflowContext`]:
/// merges the in-flight update log over the last committed snapshot.
pub struct StateView {
    committed: RwLock<HashMap<(ScopeId, String), PortableValue>>,
    pending: RwLock<UpdateLog>,
}

impl StateView {
    fn new() -> Self {
        Self {
            committed: RwLock::new(HashMap::new()),
            pending: RwLock::new(UpdateLog::default()),
        }
    }

    /// Merged view: pending-update-log wins over committed; a key under a
    /// reset scope with no subsequent per-key update reads back as absent.
    pub fn read(&self, scope: &ScopeId, key: &str) -> Option<PortableValue> {
        let pending = self.pending.read();
        if let Some(op) = pending.updates.get(&(scope.clone(), key.to_string())) {
            return match op {
                PendingOp::Update(value) => Some(value.clone()),
                PendingOp::Reset => None,
            };
        }
        if pending.reset_scopes.contains(scope) {
            return None;
        }
        self.committed
            .read()
            .get(&(scope.clone(), key.to_string()))
            .cloned()
    }

    pub fn queue_update(&self, scope: ScopeId, key: String, value: PortableValue) {
        self.pending
            .write()
            .updates
            .insert((scope, key), PendingOp::Update(value));
    }

    pub fn queue_reset(&self, scope: ScopeId) {
        let mut pending = self.pending.write();
        pending.updates.retain(|(s, _), _| s != &scope);
        pending.reset_scopes.push(scope);
    }
}

/// Owns the committed snapshot and drives commit/export/import. Wraps a
/// [`StateView`] for the read side used by handlers.
pub struct StateManager {
    view: StateView,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            view: StateView::new(),
        }
    }

    pub fn view(&self) -> &StateView {
        &self.view
    }

    /// Atomically apply every staged write from the current superstep:
    /// resets first (clearing the scope's committed keys), then per-key
    /// updates, then clear the update log for the next step.
    pub fn commit(&self) -> bool {
        let mut pending = self.view.pending.write();
        if pending.updates.is_empty() && pending.reset_scopes.is_empty() {
            return false;
        }
        let mut committed = self.view.committed.write();
        for scope in pending.reset_scopes.drain(..) {
            committed.retain(|(s, _), _| s != &scope);
        }
        for ((scope, key), op) in pending.updates.drain() {
            match op {
                PendingOp::Update(value) => {
                    committed.insert((scope, key), value);
                }
                PendingOp::Reset => {
                    committed.remove(&(scope, key));
                }
            }
        }
        true
    }

    /// Export the committed snapshot. Must be called with an empty update
    /// log, otherwise `StateError`.
    pub fn export_state(&self) -> Result<HashMap<(ScopeId, String), PortableValue>> {
        let pending = self.view.pending.read();
        if !pending.updates.is_empty() || !pending.reset_scopes.is_empty() {
            return Err(WorkflowError::state(
                "export_state called with a non-empty update log",
            ));
        }
        Ok(self.view.committed.read().clone())
    }

    /// Replace all scopes and clear the update log wholesale.
    pub fn import_state(&self, snapshot: HashMap<(ScopeId, String), PortableValue>) {
        *self.view.committed.write() = snapshot;
        *self.view.pending.write() = UpdateLog::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ExecutorId;

    fn scope() -> ScopeId {
        ScopeId::new(ExecutorId::new("A"))
    }

    #[test]
    fn staged_write_visible_before_commit() {
        let mgr = StateManager::new();
        mgr.view()
            .queue_update(scope(), "count".into(), PortableValue::of(1i64));
        let seen = mgr.view().read(&scope(), "count").unwrap();
        assert_eq!(*seen.as_ref::<i64>().unwrap(), 1);
    }

    #[test]
    fn commit_then_new_step_reads_committed_value() {
        let mgr = StateManager::new();
        mgr.view()
            .queue_update(scope(), "count".into(), PortableValue::of(2i64));
        assert!(mgr.commit());
        let seen = mgr.view().read(&scope(), "count").unwrap();
        assert_eq!(*seen.as_ref::<i64>().unwrap(), 2);
    }

    #[test]
    fn export_fails_with_pending_writes() {
        let mgr = StateManager::new();
        mgr.view()
            .queue_update(scope(), "x".into(), PortableValue::of(1i64));
        assert!(mgr.export_state().is_err());
    }

    #[test]
    fn reset_then_update_in_same_step_keeps_the_update() {
        let mgr = StateManager::new();
        mgr.view()
            .queue_update(scope(), "x".into(), PortableValue::of(1i64));
        mgr.commit();
        mgr.view().queue_reset(scope());
        mgr.view()
            .queue_update(scope(), "x".into(), PortableValue::of(9i64));
        let seen = mgr.view().read(&scope(), "x").unwrap();
        assert_eq!(*seen.as_ref::<i64>().unwrap(), 9);
    }

    #[test]
    fn import_replaces_snapshot_wholesale() {
        let mgr = StateManager::new();
        mgr.view()
            .queue_update(scope(), "x".into(), PortableValue::of(1i64));
        mgr.commit();
        let exported = mgr.export_state().unwrap();
        let mgr2 = StateManager::new();
        mgr2.import_state(exported);
        let seen = mgr2.view().read(&scope(), "x").unwrap();
        assert_eq!(*seen.as_ref::<i64>().unwrap(), 1);
    }
}
