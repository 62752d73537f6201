//! Boundary between the session state machine and the proprietary upstream
//! protocol. Cryptographic framing and the companion-device handshake are
//! out of scope here; everything past this trait is the concern of whatever
//! concrete client is wired in at startup.

use chrono::{DateTime, Utc};
use conduit_common::upstream_event::UpstreamEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub enum UpstreamSignal {
    QrArtifact {
        payload: String,
        expires_at: DateTime<Utc>,
    },
    Paired {
        platform_user_id: String,
    },
    /// First steady-state readiness event; drives `Paired -> Connected`.
    Ready,
    Event(UpstreamEvent),
    Disconnected {
        reason: Option<String>,
    },
    LoggedOut,
    Fault(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream connect failed: {0}")]
    ConnectFailed(String),
    #[error("upstream send failed: {0}")]
    SendFailed(String),
    #[error("upstream session not connected")]
    NotConnected,
}

/// One live upstream connection. `connect` returns a channel the session
/// task drains for the lifetime of the connection; `send_message` is called
/// directly by the outbox dispatch path.
#[async_trait::async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn connect(&self, session_id: Uuid) -> Result<mpsc::Receiver<UpstreamSignal>, UpstreamError>;
    async fn send_message(&self, convo_id: &str, body: &str) -> Result<String, UpstreamError>;
    async fn disconnect(&self);
}

/// Deterministic in-memory double used by tests and local runs. Emits a QR
/// artifact, pairs after a short fixed delay, becomes ready, replays a
/// single synthetic history bundle, then idles until disconnected.
pub struct SimulatedUpstream {
    pair_delay: std::time::Duration,
}

impl SimulatedUpstream {
    pub fn new() -> Self {
        Self {
            pair_delay: std::time::Duration::from_millis(50),
        }
    }

    #[cfg(test)]
    pub fn with_pair_delay(pair_delay: std::time::Duration) -> Self {
        Self { pair_delay }
    }
}

impl Default for SimulatedUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UpstreamClient for SimulatedUpstream {
    async fn connect(&self, session_id: Uuid) -> Result<mpsc::Receiver<UpstreamSignal>, UpstreamError> {
        let (tx, rx) = mpsc::channel(16);
        let pair_delay = self.pair_delay;

        tokio::spawn(async move {
            let _ = tx
                .send(UpstreamSignal::QrArtifact {
                    payload: format!("simulated-qr:{session_id}"),
                    expires_at: Utc::now() + chrono::Duration::seconds(30),
                })
                .await;

            tokio::time::sleep(pair_delay).await;
            let platform_user_id = format!("sim-user-{}", &session_id.to_string()[..8]);
            if tx
                .send(UpstreamSignal::Paired {
                    platform_user_id: platform_user_id.clone(),
                })
                .await
                .is_err()
            {
                return;
            }

            tokio::time::sleep(pair_delay).await;
            if tx.send(UpstreamSignal::Ready).await.is_err() {
                return;
            }

            let history = UpstreamEvent::HistoryBundle {
                conversations: vec![conduit_common::upstream_event::UpstreamConversation {
                    external_id: format!("{platform_user_id}@sim"),
                    name: Some("Simulated Chat".to_string()),
                    avatar_url: None,
                    participant_external_ids: Vec::new(),
                    is_broadcast: false,
                    is_channel: false,
                }],
                messages_by_conversation: Vec::new(),
            };
            let _ = tx.send(UpstreamSignal::Event(history)).await;
        });

        Ok(rx)
    }

    async fn send_message(&self, convo_id: &str, body: &str) -> Result<String, UpstreamError> {
        tracing::debug!(convo_id, len = body.len(), "simulated upstream send");
        Ok(format!("sim-msg-{}", Uuid::new_v4()))
    }

    async fn disconnect(&self) {}
}
