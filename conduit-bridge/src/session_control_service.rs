//! Client-facing pairing surface: `Connect`/`Disconnect`/`Status`, the three
//! public operations the Session Supervisor exposes (distinct from
//! `BridgeControlService`, which only the Core calls).

use std::sync::Arc;

use conduit_common::model::IntegrationType;
use conduit_proto::session_control_service_server::SessionControlService;
use conduit_proto::{ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, SessionStatusRequest, SessionStatusResponse};
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::session::{SessionSupervisor, SupervisorError};

pub struct SessionControlServiceImpl {
    supervisor: Arc<SessionSupervisor>,
}

impl SessionControlServiceImpl {
    pub fn new(supervisor: Arc<SessionSupervisor>) -> Self {
        Self { supervisor }
    }
}

fn parse_integration_type(s: &str) -> Result<IntegrationType, Status> {
    match s {
        "whatsapp" => Ok(IntegrationType::Whatsapp),
        other => Err(Status::invalid_argument(format!("unknown integration_type: {other}"))),
    }
}

fn map_supervisor_error(err: SupervisorError) -> Status {
    match err {
        SupervisorError::AlreadyConnected(_) => Status::already_exists(err.to_string()),
        SupervisorError::QrTimeout => Status::deadline_exceeded(err.to_string()),
        SupervisorError::NotFound(_) => Status::not_found(err.to_string()),
        SupervisorError::SessionGone | SupervisorError::Internal(_) => Status::internal(err.to_string()),
    }
}

#[tonic::async_trait]
impl SessionControlService for SessionControlServiceImpl {
    async fn connect(&self, request: Request<ConnectRequest>) -> Result<Response<ConnectResponse>, Status> {
        let req = request.into_inner();
        let user_id = Uuid::parse_str(&req.user_id).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let integration_type = parse_integration_type(&req.integration_type)?;

        let outcome = self
            .supervisor
            .connect(user_id, integration_type)
            .await
            .map_err(map_supervisor_error)?;

        Ok(Response::new(ConnectResponse {
            session_id: user_id.to_string(),
            qr_payload: outcome.qr_payload,
            expires_at_secs: outcome.expires_at.timestamp(),
        }))
    }

    async fn disconnect(&self, request: Request<DisconnectRequest>) -> Result<Response<DisconnectResponse>, Status> {
        let req = request.into_inner();
        let user_id = Uuid::parse_str(&req.user_id).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let integration_type = parse_integration_type(&req.integration_type)?;

        self.supervisor
            .disconnect(user_id, integration_type)
            .await
            .map_err(map_supervisor_error)?;

        Ok(Response::new(DisconnectResponse {}))
    }

    async fn status(&self, request: Request<SessionStatusRequest>) -> Result<Response<SessionStatusResponse>, Status> {
        let req = request.into_inner();
        let user_id = Uuid::parse_str(&req.user_id).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let integration_type = parse_integration_type(&req.integration_type)?;

        let status = self
            .supervisor
            .status(user_id, integration_type)
            .await
            .map_err(map_supervisor_error)?;

        Ok(Response::new(SessionStatusResponse {
            state: status.state.as_str().to_string(),
            platform_user_id: status.platform_user_id.unwrap_or_default(),
            last_seen_secs: status.last_seen.map(|t| t.timestamp()).unwrap_or(0),
        }))
    }
}

pub fn server(
    supervisor: Arc<SessionSupervisor>,
) -> conduit_proto::session_control_service_server::SessionControlServiceServer<SessionControlServiceImpl> {
    conduit_proto::session_control_service_server::SessionControlServiceServer::new(SessionControlServiceImpl::new(supervisor))
}
