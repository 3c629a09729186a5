//! [`PortableValue`] — a value plus its logical [`TypeId`], supporting
//! delayed deserialization so checkpoints and inter-run handoff need not
//! eagerly decode every payload.

use crate::id::TypeId;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

enum Inner {
    /// Already a concrete Rust value, plus a type-specific equality
    /// comparator captured at construction time (type-erased `Any` has no
    /// equality of its own).
    Eager {
        value: Arc<dyn Any + Send + Sync>,
        eq: fn(&dyn Any, &dyn Any) -> bool,
    },
    /// Not yet decoded; decoded on first `as_ref::<T>()`/`is::<T>()` and
    /// memoized so repeated access doesn't re-parse.
    Delayed {
        payload: serde_json::Value,
        decoded: Mutex<Option<Arc<dyn Any + Send + Sync>>>,
    },
}

fn eq_dyn<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// A carrier for a value plus its logical [`TypeId`].
///
/// Equality is `TypeId` plus decoded value equality — two `PortableValue`s
/// with different `TypeId`s are never equal even if their payloads match.
pub struct PortableValue {
    type_id: TypeId,
    inner: Inner,
}

impl PortableValue {
    pub fn eager<T: PartialEq + Send + Sync + 'static>(value: T, type_id: TypeId) -> Self {
        Self {
            type_id,
            inner: Inner::Eager {
                value: Arc::new(value),
                eq: eq_dyn::<T>,
            },
        }
    }

    /// Construct from a typed value, inferring the [`TypeId`] from `T`.
    pub fn of<T: PartialEq + Send + Sync + 'static>(value: T) -> Self {
        Self::eager(value, TypeId::of::<T>())
    }

    pub fn delayed(payload: serde_json::Value, type_id: TypeId) -> Self {
        Self {
            type_id,
            inner: Inner::Delayed {
                payload,
                decoded: Mutex::new(None),
            },
        }
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    /// Materialize as `T` if the underlying object already is `T`, or the
    /// delayed payload decodes into `T`. Decoding a delayed value is
    /// memoized.
    pub fn as_ref<T: serde::de::DeserializeOwned + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match &self.inner {
            Inner::Eager { value, .. } => value.clone().downcast::<T>().ok(),
            Inner::Delayed { payload, decoded } => {
                let mut slot = decoded.lock();
                if let Some(existing) = slot.as_ref() {
                    return existing.clone().downcast::<T>().ok();
                }
                let value: T = serde_json::from_value(payload.clone()).ok()?;
                let arc: Arc<dyn Any + Send + Sync> = Arc::new(value);
                *slot = Some(arc.clone());
                arc.downcast::<T>().ok()
            }
        }
    }

    /// Same as [`Self::as_ref`] but only reports whether decoding would
    /// succeed, without panicking or surfacing the error.
    pub fn is<T: serde::de::DeserializeOwned + Send + Sync + 'static>(&self) -> bool {
        self.as_ref::<T>().is_some()
    }

    /// Serialize to the JSON wire payload used by checkpoints and the
    /// external request/response contract. Eager values round-trip through
    /// `Serialize`; delayed values return their already-JSON payload as-is.
    pub fn to_json<T: serde::Serialize + Send + Sync + 'static>(&self) -> Option<serde_json::Value> {
        match &self.inner {
            Inner::Eager { value, .. } => {
                let typed = value.clone().downcast::<T>().ok()?;
                serde_json::to_value(&*typed).ok()
            }
            Inner::Delayed { payload, .. } => Some(payload.clone()),
        }
    }

    /// Build a [`PortableValue`] directly from an already-JSON payload,
    /// without committing to a concrete type. Used by edge runners and the
    /// coordinator, which move values without needing to decode them.
    pub fn from_json(payload: serde_json::Value, type_id: TypeId) -> Self {
        Self::delayed(payload, type_id)
    }

    /// Best-effort JSON view for logging/predicate evaluation when the
    /// concrete type is unknown at this call site. Eager values that are
    /// not `serde_json::Value` itself return `None`.
    pub fn peek_json(&self) -> Option<serde_json::Value> {
        match &self.inner {
            Inner::Eager { value, .. } => value
                .clone()
                .downcast::<serde_json::Value>()
                .ok()
                .map(|v| (*v).clone()),
            Inner::Delayed { payload, .. } => Some(payload.clone()),
        }
    }
}

impl PartialEq for PortableValue {
    fn eq(&self, other: &Self) -> bool {
        if self.type_id != other.type_id {
            return false;
        }
        match (&self.inner, &other.inner) {
            (Inner::Eager { value: a, eq }, Inner::Eager { value: b, .. }) => {
                eq(a.as_ref(), b.as_ref())
            }
            (Inner::Delayed { payload: a, .. }, Inner::Delayed { payload: b, .. }) => a == b,
            (Inner::Eager { value, .. }, Inner::Delayed { payload, .. })
            | (Inner::Delayed { payload, .. }, Inner::Eager { value, .. }) => value
                .as_ref()
                .downcast_ref::<serde_json::Value>()
                .map(|v| v == payload)
                .unwrap_or(false),
        }
    }
}

impl fmt::Debug for PortableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableValue")
            .field("type_id", &self.type_id)
            .field(
                "state",
                &match &self.inner {
                    Inner::Eager { .. } => "eager",
                    Inner::Delayed { .. } => "delayed",
                },
            )
            .finish()
    }
}

impl Clone for PortableValue {
    fn clone(&self) -> Self {
        match &self.inner {
            Inner::Eager { value, eq } => Self {
                type_id: self.type_id.clone(),
                inner: Inner::Eager {
                    value: value.clone(),
                    eq: *eq,
                },
            },
            Inner::Delayed { payload, decoded } => Self {
                type_id: self.type_id.clone(),
                inner: Inner::Delayed {
                    payload: payload.clone(),
                    decoded: Mutex::new(decoded.lock().clone()),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn eager_value_downcasts() {
        let pv = PortableValue::of(Point { x: 1, y: 2 });
        let restored = pv.as_ref::<Point>().unwrap();
        assert_eq!(*restored, Point { x: 1, y: 2 });
    }

    #[test]
    fn delayed_value_decodes_lazily_and_memoizes() {
        let pv = PortableValue::delayed(serde_json::json!({"x": 3, "y": 4}), TypeId::of::<Point>());
        assert!(pv.is::<Point>());
        let first = pv.as_ref::<Point>().unwrap();
        let second = pv.as_ref::<Point>().unwrap();
        assert_eq!(*first, *second);
    }

    #[test]
    fn mismatched_type_is_none_not_panic() {
        let pv = PortableValue::delayed(serde_json::json!("not a point"), TypeId::of::<Point>());
        assert!(pv.as_ref::<Point>().is_none());
    }

    #[test]
    fn eager_equality_compares_value_not_identity() {
        assert_eq!(PortableValue::of(Point { x: 1, y: 2 }), PortableValue::of(Point { x: 1, y: 2 }));
        assert_ne!(PortableValue::of(Point { x: 1, y: 2 }), PortableValue::of(Point { x: 1, y: 3 }));
    }

    #[test]
    fn equality_requires_matching_type_id_even_with_same_payload() {
        let a = PortableValue::delayed(serde_json::json!(1), TypeId::named("a"));
        let b = PortableValue::delayed(serde_json::json!(1), TypeId::named("b"));
        assert_ne!(a, b);
    }

    #[test]
    fn delayed_values_compare_by_payload() {
        let a = PortableValue::delayed(serde_json::json!({"x": 1, "y": 2}), TypeId::of::<Point>());
        let b = PortableValue::delayed(serde_json::json!({"x": 1, "y": 2}), TypeId::of::<Point>());
        assert_eq!(a, b);
    }
}
