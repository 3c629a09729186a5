//! The external request/response coordinator (§4.6): tracks outstanding
//! [`ExternalRequest`]s and matches host-posted [`ExternalResponse`]s to
//! them purely by `requestId`.

use crate::envelope::{ExternalRequest, ExternalResponse, PortInfo};
use crate::error::{Result, WorkflowError};
use crate::id::{PortId, RequestId, TypeId};
use crate::portable::PortableValue;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A request recorded while awaiting a host response.
pub struct PendingRequest {
    pub port_id: PortId,
    pub request_type: TypeId,
    pub response_type: TypeId,
    pub request_id: RequestId,
    pub data: PortableValue,
}

impl From<&ExternalRequest> for PendingRequest {
    fn from(request: &ExternalRequest) -> Self {
        Self {
            port_id: request.port_info.port_id.clone(),
            request_type: request.port_info.request_type.clone(),
            response_type: request.port_info.response_type.clone(),
            request_id: request.request_id.clone(),
            data: request.data.clone(),
        }
    }
}

/// Answer produced once a response is matched: the value to forward to the
/// port's successors, honoring `allowWrapped`.
pub struct MatchedResponse {
    pub port_id: PortId,
    pub value: PortableValue,
}

#[derive(Default)]
pub struct RequestResponseCoordinator {
    pending: RwLock<HashMap<RequestId, PendingRequest>>,
    /// Request ids already answered, kept so a retried duplicate post is
    /// rejected rather than silently accepted as a second match.
    answered: RwLock<std::collections::HashSet<RequestId>>,
}

impl RequestResponseCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, request: &ExternalRequest) {
        self.pending.write().insert(
            request.request_id.clone(),
            PendingRequest::from(request),
        );
    }

    pub fn has_outstanding(&self) -> bool {
        !self.pending.read().is_empty()
    }

    pub fn outstanding_snapshot(&self) -> HashMap<RequestId, PendingRequest> {
        let pending = self.pending.read();
        pending
            .iter()
            .map(|(id, req)| {
                (
                    id.clone(),
                    PendingRequest {
                        port_id: req.port_id.clone(),
                        request_type: req.request_type.clone(),
                        response_type: req.response_type.clone(),
                        request_id: req.request_id.clone(),
                        data: req.data.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn restore(&self, pending: HashMap<RequestId, PendingRequest>) {
        *self.pending.write() = pending;
        self.answered.write().clear();
    }

    /// Match a host-posted response, producing the value to forward to the
    /// port's successors. Unknown id → `UnknownRequest`; an id already
    /// matched once → `DuplicateResponse`.
    pub fn post_response(
        &self,
        response: ExternalResponse,
        allow_wrapped: bool,
    ) -> Result<MatchedResponse> {
        if self.answered.read().contains(&response.request_id) {
            return Err(WorkflowError::DuplicateResponse(response.request_id));
        }
        let mut pending = self.pending.write();
        let request = pending
            .remove(&response.request_id)
            .ok_or_else(|| WorkflowError::UnknownRequest(response.request_id.clone()))?;
        self.answered.write().insert(response.request_id.clone());

        let value = if allow_wrapped {
            PortableValue::eager(
                WrappedResponse {
                    request: request.data,
                    response: response.data,
                },
                TypeId::named("wrapped_response"),
            )
        } else {
            response.data
        };

        Ok(MatchedResponse {
            port_id: response.port_id,
            value,
        })
    }
}

/// The `allowWrapped` payload shape: the original request alongside the
/// matched response.
pub struct WrappedResponse {
    pub request: PortableValue,
    pub response: PortableValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ExternalRequest {
        ExternalRequest {
            port_info: PortInfo {
                port_id: PortId::new("P"),
                request_type: TypeId::named("Q"),
                response_type: TypeId::named("R"),
            },
            request_id: RequestId::new(id),
            data: PortableValue::of(1i64),
        }
    }

    #[test]
    fn unknown_request_id_is_rejected() {
        let coordinator = RequestResponseCoordinator::new();
        let response = ExternalResponse {
            port_id: PortId::new("P"),
            request_id: RequestId::new("missing"),
            data: PortableValue::of(2i64),
        };
        let err = coordinator.post_response(response, false);
        assert!(matches!(err, Err(WorkflowError::UnknownRequest(_))));
    }

    #[test]
    fn duplicate_response_is_rejected() {
        let coordinator = RequestResponseCoordinator::new();
        let req = request("r1");
        coordinator.record_request(&req);
        let response = ExternalResponse {
            port_id: PortId::new("P"),
            request_id: RequestId::new("r1"),
            data: PortableValue::of(2i64),
        };
        assert!(coordinator.post_response(response, false).is_ok());
        let dup = ExternalResponse {
            port_id: PortId::new("P"),
            request_id: RequestId::new("r1"),
            data: PortableValue::of(3i64),
        };
        let err = coordinator.post_response(dup, false);
        assert!(matches!(err, Err(WorkflowError::DuplicateResponse(_))));
    }

    #[test]
    fn matched_response_clears_outstanding() {
        let coordinator = RequestResponseCoordinator::new();
        let req = request("r2");
        coordinator.record_request(&req);
        assert!(coordinator.has_outstanding());
        let response = ExternalResponse {
            port_id: PortId::new("P"),
            request_id: RequestId::new("r2"),
            data: PortableValue::of(2i64),
        };
        coordinator.post_response(response, false).unwrap();
        assert!(!coordinator.has_outstanding());
    }
}
