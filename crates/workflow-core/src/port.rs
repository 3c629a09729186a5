//! Request ports (§3, §4.6): an executor whose job is to convert inbound
//! messages into [`ExternalRequest`]s and, on a matching [`ExternalResponse`],
//! forward the response to its successors.

use crate::config::ExecutorOptions;
use crate::envelope::{ExternalResponse, PortInfo};
use crate::error::Result;
use crate::executor::{Executor, RespondsToExternal, RouteTable, WorkflowContext};
use crate::id::{ExecutorId, PortId, TypeId};
use crate::portable::PortableValue;
use async_trait::async_trait;

/// `{id, requestType, responseType, allowWrapped}` from the data model.
pub struct RequestPort {
    id: ExecutorId,
    port_id: PortId,
    request_type: TypeId,
    response_type: TypeId,
    /// If set, a matched response is forwarded together with the original
    /// request payload rather than just the bare response value.
    allow_wrapped: bool,
}

impl RequestPort {
    pub fn new(
        port_id: PortId,
        request_type: TypeId,
        response_type: TypeId,
        allow_wrapped: bool,
    ) -> Self {
        Self {
            id: ExecutorId::new(port_id.as_str()),
            port_id,
            request_type,
            response_type,
            allow_wrapped,
        }
    }

    pub fn port_info(&self) -> PortInfo {
        PortInfo {
            port_id: self.port_id.clone(),
            request_type: self.request_type.clone(),
            response_type: self.response_type.clone(),
        }
    }

    pub fn request_type(&self) -> &TypeId {
        &self.request_type
    }

    pub fn allow_wrapped(&self) -> bool {
        self.allow_wrapped
    }
}

#[async_trait]
impl Executor for RequestPort {
    fn id(&self) -> &ExecutorId {
        &self.id
    }

    fn routes(&self) -> RouteTable {
        // A port's inbound route is handled specially by the scheduler,
        // which diverts matching envelopes to the coordinator rather than
        // invoking a handler here. Ports never auto-send.
        RouteTable::builder().build()
    }

    fn options(&self) -> ExecutorOptions {
        ExecutorOptions {
            auto_send_message_handler_result_object: false,
            declare_cross_run_shareable: false,
        }
    }
}

#[async_trait]
impl RespondsToExternal for RequestPort {
    async fn handle_response(
        &self,
        response: ExternalResponse,
        _ctx: &WorkflowContext,
    ) -> Result<Option<PortableValue>> {
        Ok(Some(response.data))
    }
}
