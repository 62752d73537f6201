//! Server side of the Bridge control surface: the Core's outbox worker calls
//! `DispatchOutbound` here to route a queued send to the session that owns
//! the account, per the ingest/control split in the external interfaces.

use std::sync::Arc;

use conduit_proto::bridge_control_service_server::BridgeControlService;
use conduit_proto::{DispatchOutboundRequest, DispatchOutboundResponse};
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::session::SessionSupervisor;

pub struct BridgeControlServiceImpl {
    supervisor: Arc<SessionSupervisor>,
}

impl BridgeControlServiceImpl {
    pub fn new(supervisor: Arc<SessionSupervisor>) -> Self {
        Self { supervisor }
    }
}

#[tonic::async_trait]
impl BridgeControlService for BridgeControlServiceImpl {
    async fn dispatch_outbound(
        &self,
        request: Request<DispatchOutboundRequest>,
    ) -> Result<Response<DispatchOutboundResponse>, Status> {
        let req = request.into_inner();
        let client_msg_uuid = Uuid::parse_str(&req.client_msg_uuid)
            .map_err(|e| Status::invalid_argument(format!("bad client_msg_uuid: {e}")))?;

        match self
            .supervisor
            .dispatch_outbound(req.account_id, client_msg_uuid, req.convo_id, req.body)
            .await
        {
            Ok(upstream_message_id) => Ok(Response::new(DispatchOutboundResponse {
                accepted: true,
                upstream_message_id,
                error: String::new(),
            })),
            Err(err) => {
                tracing::warn!(account_id = req.account_id, error = %err, "outbound dispatch rejected");
                Ok(Response::new(DispatchOutboundResponse {
                    accepted: false,
                    upstream_message_id: String::new(),
                    error: err.to_string(),
                }))
            }
        }
    }
}

pub fn server(supervisor: Arc<SessionSupervisor>) -> conduit_proto::bridge_control_service_server::BridgeControlServiceServer<BridgeControlServiceImpl> {
    conduit_proto::bridge_control_service_server::BridgeControlServiceServer::new(BridgeControlServiceImpl::new(supervisor))
}
