//! Wire-free types shared between the supervisor and a single session task.

use chrono::{DateTime, Utc};
use conduit_common::model::IntegrationType;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: Uuid,
    pub integration_type: IntegrationType,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{:?}", self.user_id, self.integration_type)
    }
}

/// Mirrors the `Idle -> Pairing -> Paired -> Connected -> Disconnected/Error`
/// machine. `Error` carries a short reason for `Status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pairing,
    Paired,
    Connected,
    Disconnected,
    Error(String),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Pairing => "pairing",
            SessionState::Paired => "paired",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub state: SessionState,
    pub platform_user_id: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum SessionCommand {
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    DispatchOutbound {
        client_msg_uuid: Uuid,
        convo_id: String,
        body: String,
        reply: oneshot::Sender<Result<String, String>>,
    },
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub commands: mpsc::Sender<SessionCommand>,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("session already connected for {0}")]
    AlreadyConnected(SessionKey),
    #[error("no pairing artifact arrived within the timeout")]
    QrTimeout,
    #[error("no session found for {0}")]
    NotFound(SessionKey),
    #[error("session task is gone")]
    SessionGone,
    #[error("internal error: {0}")]
    Internal(String),
}
