//! Messages in flight: [`MessageEnvelope`] between executors, and the
//! [`ExternalRequest`]/[`ExternalResponse`] pair that crosses the run
//! boundary through a request port.

use crate::id::{ExecutorId, PortId, RequestId, TypeId};
use crate::portable::PortableValue;

/// A message plus routing metadata. `source_id = None` marks an envelope
/// that entered the run from outside (initial input, or a re-injected
/// external response).
pub struct MessageEnvelope {
    pub message: PortableValue,
    pub declared_type: TypeId,
    pub source_id: Option<ExecutorId>,
    pub target_id: Option<ExecutorId>,
    pub trace_context: Option<serde_json::Value>,
}

impl MessageEnvelope {
    pub fn external(message: PortableValue, declared_type: TypeId, target_id: ExecutorId) -> Self {
        Self {
            message,
            declared_type,
            source_id: None,
            target_id: Some(target_id),
            trace_context: None,
        }
    }

    pub fn from_executor(
        message: PortableValue,
        declared_type: TypeId,
        source_id: ExecutorId,
        target_id: ExecutorId,
    ) -> Self {
        Self {
            message,
            declared_type,
            source_id: Some(source_id),
            target_id: Some(target_id),
            trace_context: None,
        }
    }
}

/// Information identifying a request port, handed along with a request so
/// the host knows where it came from.
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_id: PortId,
    pub request_type: TypeId,
    pub response_type: TypeId,
}

/// Emitted by a request port executor when an outbound value matches its
/// declared `requestType`.
pub struct ExternalRequest {
    pub port_info: PortInfo,
    pub request_id: RequestId,
    pub data: PortableValue,
}

/// Posted by the host in answer to a previously emitted [`ExternalRequest`],
/// matched purely by `request_id`.
pub struct ExternalResponse {
    pub port_id: PortId,
    pub request_id: RequestId,
    pub data: PortableValue,
}
