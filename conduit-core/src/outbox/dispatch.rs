use conduit_proto::bridge_control_service_client::BridgeControlServiceClient;
use conduit_proto::DispatchOutboundRequest;
use thiserror::Error;
use tonic::transport::Channel;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("bridge control channel unavailable: {0}")]
    ConnectionFailed(String),
    #[error("bridge rejected dispatch: {0}")]
    Rejected(String),
    #[error("bridge control rpc failed: {0}")]
    RpcFailed(String),
}

impl DispatchError {
    /// Mirrors the upstream-call retryability split: anything that looks
    /// like the bridge itself is unreachable is worth retrying, a deliberate
    /// rejection from a live bridge is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::ConnectionFailed(_) | DispatchError::RpcFailed(_))
    }
}

/// Thin client wrapper around `BridgeControlService`, lazily connecting on
/// first dispatch and reusing the channel afterward (`tonic::transport::Channel`
/// is cheaply cloneable and handles reconnection internally).
#[derive(Clone)]
pub struct OutboxDispatcher {
    addr: String,
}

impl OutboxDispatcher {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }

    pub async fn dispatch(
        &self,
        account_id: i32,
        client_msg_uuid: Uuid,
        convo_id: &str,
        body: &str,
    ) -> Result<String, DispatchError> {
        let channel = Channel::from_shared(self.addr.clone())
            .map_err(|e| DispatchError::ConnectionFailed(e.to_string()))?
            .connect()
            .await
            .map_err(|e| DispatchError::ConnectionFailed(e.to_string()))?;

        let mut client = BridgeControlServiceClient::new(channel);

        let request = DispatchOutboundRequest {
            account_id,
            client_msg_uuid: client_msg_uuid.to_string(),
            convo_id: convo_id.to_string(),
            body: body.to_string(),
        };

        let response = client
            .dispatch_outbound(request)
            .await
            .map_err(|status| DispatchError::RpcFailed(status.message().to_string()))?
            .into_inner();

        if !response.accepted {
            return Err(DispatchError::Rejected(response.error));
        }

        Ok(response.upstream_message_id)
    }
}
