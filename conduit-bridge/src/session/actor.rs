//! The per-session task: owns one upstream connection end-to-end through
//! `Idle -> Pairing -> Paired -> Connected -> Disconnected/Error`, feeding
//! normalized events to the Core and draining commands from the supervisor.
//!
//! Reconnect backoff (base 1s, capped 60s, +/-20% jitter) mirrors the
//! upstream WS reader's backoff shape; it is deliberately a different
//! schedule from the outbox retry worker's, which governs a different
//! failure domain (delivery, not transport).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use conduit_common::model::{ConnectionStatus, ConversationType, IntegrationType};
use conduit_proto::IntegrationContext;
use rand::Rng;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ingest_client::IngestClient;
use crate::recorder::SessionRecorder;
use crate::session::pairing::MAX_REFRESHES;
use crate::session::types::{ConnectOutcome, SessionCommand, SessionKey, SessionState, SessionStatus};
use crate::upstream::{UpstreamClient, UpstreamSignal};

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(60);

pub struct SessionArgs {
    pub key: SessionKey,
    pub upstream: Box<dyn UpstreamClient>,
    pub ingest_addr: String,
    pub commands: mpsc::Receiver<SessionCommand>,
    pub qr_ready: Option<oneshot::Sender<ConnectOutcome>>,
    pub supervisor_integration_registry: Arc<RwLock<HashMap<i32, SessionKey>>>,
    pub recorder: SessionRecorder,
    pub shutdown: CancellationToken,
}

fn integration_type_str(t: IntegrationType) -> &'static str {
    match t {
        IntegrationType::Whatsapp => "whatsapp",
    }
}

fn build_ctx(key: &SessionKey, user_integration_id: Option<i32>, platform_user_id: &Option<String>) -> Option<IntegrationContext> {
    user_integration_id.map(|id| IntegrationContext {
        user_id: key.user_id.to_string(),
        user_integration_id: id,
        integration_type: integration_type_str(key.integration_type).to_string(),
        platform_user_id: platform_user_id.clone().unwrap_or_default(),
    })
}

/// Retries with jittered, exponential, capped backoff until the upstream
/// reconnects or `shutdown` fires. Only returns `false` if shutdown won the
/// race; any `true` return carries a fresh `upstream_rx`.
async fn reconnect(
    key: &SessionKey,
    upstream: &dyn UpstreamClient,
    shutdown: &CancellationToken,
    backoff: &mut Duration,
    upstream_rx: &mut mpsc::Receiver<UpstreamSignal>,
) -> bool {
    loop {
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        let sleep_for = Duration::from_secs_f64(backoff.as_secs_f64() * jitter);

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = shutdown.cancelled() => return false,
        }

        *backoff = (*backoff * 2).min(RECONNECT_CAP);

        match upstream.connect(key.user_id).await {
            Ok(rx) => {
                *upstream_rx = rx;
                return true;
            }
            Err(err) => {
                tracing::warn!(
                    session = %key,
                    error = %err,
                    backoff_secs = backoff.as_secs(),
                    "reconnect attempt failed, retrying"
                );
            }
        }
    }
}

pub async fn run_session(args: SessionArgs) {
    let SessionArgs {
        key,
        upstream,
        ingest_addr,
        mut commands,
        mut qr_ready,
        supervisor_integration_registry,
        recorder,
        shutdown,
    } = args;

    let ingest = match IngestClient::connect(ingest_addr).await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(session = %key, error = %err, "failed to reach ingest service, session aborted");
            return;
        }
    };

    let mut upstream_rx = match upstream.connect(key.user_id).await {
        Ok(rx) => rx,
        Err(err) => {
            tracing::error!(session = %key, error = %err, "upstream connect failed, session aborted");
            return;
        }
    };

    let mut state = SessionState::Idle;
    let mut platform_user_id: Option<String> = None;
    let mut user_integration_id: Option<i32> = None;
    let mut last_seen: Option<DateTime<Utc>> = None;
    let mut qr_refresh_count: u32 = 0;
    let mut backoff = RECONNECT_BASE;
    let mut conversation_types: HashMap<String, ConversationType> = HashMap::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                upstream.disconnect().await;
                tracing::info!(session = %key, "session shut down");
                return;
            }

            maybe_cmd = commands.recv() => {
                match maybe_cmd {
                    Some(SessionCommand::Disconnect { reply }) => {
                        upstream.disconnect().await;
                        if let Some(ctx) = build_ctx(&key, user_integration_id, &platform_user_id) {
                            let _ = ingest.update_connection_status(ctx, ConnectionStatus::Disconnected, None).await;
                        }
                        let _ = reply.send(());
                        return;
                    }
                    Some(SessionCommand::Status { reply }) => {
                        let _ = reply.send(SessionStatus {
                            state: state.clone(),
                            platform_user_id: platform_user_id.clone(),
                            last_seen,
                        });
                    }
                    Some(SessionCommand::DispatchOutbound { client_msg_uuid, convo_id, body, reply }) => {
                        if state != SessionState::Connected {
                            let _ = reply.send(Err("session not connected".to_string()));
                        } else {
                            tracing::debug!(session = %key, %client_msg_uuid, %convo_id, "dispatching outbound message");
                            let result = upstream
                                .send_message(&convo_id, &body)
                                .await
                                .map_err(|e| e.to_string());
                            let _ = reply.send(result);
                        }
                    }
                    None => {
                        tracing::warn!(session = %key, "command channel closed, ending session");
                        return;
                    }
                }
            }

            signal = upstream_rx.recv() => {
                if let Some(sig) = &signal {
                    recorder.record(sig).await;
                }
                match signal {
                    Some(UpstreamSignal::QrArtifact { payload, expires_at }) => {
                        state = SessionState::Pairing;
                        if let Some(tx) = qr_ready.take() {
                            let _ = tx.send(ConnectOutcome { qr_payload: payload, expires_at });
                        } else {
                            qr_refresh_count += 1;
                            if qr_refresh_count > MAX_REFRESHES {
                                tracing::warn!(session = %key, "qr pairing exceeded refresh budget");
                                return;
                            }
                        }
                    }
                    Some(UpstreamSignal::Paired { platform_user_id: puid }) => {
                        state = SessionState::Paired;
                        platform_user_id = Some(puid.clone());
                        match ingest
                            .create_user_integration(&key.user_id.to_string(), integration_type_str(key.integration_type), &puid, None, None)
                            .await
                        {
                            Ok(id) => {
                                user_integration_id = Some(id);
                                supervisor_integration_registry.write().await.insert(id, key);
                            }
                            Err(err) => tracing::error!(session = %key, error = %err, "failed to register user integration"),
                        }
                    }
                    Some(UpstreamSignal::Ready) => {
                        state = SessionState::Connected;
                        last_seen = Some(Utc::now());
                        backoff = RECONNECT_BASE;
                        if let Some(ctx) = build_ctx(&key, user_integration_id, &platform_user_id) {
                            if let Err(err) = ingest.update_connection_status(ctx, ConnectionStatus::Connected, None).await {
                                tracing::warn!(session = %key, error = %err, "failed to report connected status");
                            }
                        }
                    }
                    Some(UpstreamSignal::Event(event)) => {
                        last_seen = Some(Utc::now());
                        if let Some(ctx) = build_ctx(&key, user_integration_id, &platform_user_id) {
                            for action in conduit_common::normalizer::normalize(event) {
                                if let conduit_common::normalizer::NormalizedAction::UpsertConversations(convs) = &action {
                                    for c in convs {
                                        conversation_types.insert(c.external_conversation_id.clone(), c.conversation_type);
                                    }
                                }
                                if let Err(err) = ingest.dispatch_action(ctx.clone(), action, &conversation_types).await {
                                    tracing::warn!(session = %key, error = %err, "failed to dispatch normalized action");
                                }
                            }
                        } else {
                            tracing::debug!(session = %key, "dropping event before user_integration_id is known");
                        }
                    }
                    Some(UpstreamSignal::Disconnected { reason }) => {
                        state = SessionState::Disconnected;
                        tracing::warn!(session = %key, ?reason, "upstream disconnected, will reconnect");
                        if let Some(ctx) = build_ctx(&key, user_integration_id, &platform_user_id) {
                            let _ = ingest.update_connection_status(ctx, ConnectionStatus::Disconnected, None).await;
                        }
                        if !reconnect(&key, upstream.as_ref(), &shutdown, &mut backoff, &mut upstream_rx).await {
                            return;
                        }
                    }
                    Some(UpstreamSignal::LoggedOut) => {
                        state = SessionState::Disconnected;
                        tracing::info!(session = %key, "upstream logged out, ending session");
                        if let Some(ctx) = build_ctx(&key, user_integration_id, &platform_user_id) {
                            let _ = ingest.update_connection_status(ctx, ConnectionStatus::Disconnected, None).await;
                        }
                        return;
                    }
                    Some(UpstreamSignal::Fault(reason)) => {
                        state = SessionState::Error(reason.clone());
                        tracing::error!(session = %key, error = %reason, "unrecoverable upstream fault, ending session");
                        return;
                    }
                    None => {
                        tracing::warn!(session = %key, "upstream channel closed, will reconnect");
                        if !reconnect(&key, upstream.as_ref(), &shutdown, &mut backoff, &mut upstream_rx).await {
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_type_str_matches_wire_value() {
        assert_eq!(integration_type_str(IntegrationType::Whatsapp), "whatsapp");
    }

    #[test]
    fn build_ctx_is_none_until_integration_id_known() {
        let key = SessionKey {
            user_id: Uuid::new_v4(),
            integration_type: IntegrationType::Whatsapp,
        };
        assert!(build_ctx(&key, None, &None).is_none());
        assert!(build_ctx(&key, Some(7), &Some("puid".to_string())).is_some());
    }
}
