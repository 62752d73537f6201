//! Central registry for live upstream sessions.
//!
//! Mirrors the get-or-spawn / cache / shutdown-all shape of a conversation
//! actor registry, but keyed on `(user_id, integration_type)` and backed by
//! a reader-writer lock rather than a lock-free map: lookups are hot,
//! inserts are rare, and the spec calls for an explicit RwLock here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conduit_common::model::IntegrationType;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RecordingMode;
use crate::recorder::SessionRecorder;
use crate::session::actor::{run_session, SessionArgs};
use crate::session::pairing::FIRST_ARTIFACT_TIMEOUT;
use crate::session::types::{ConnectOutcome, SessionCommand, SessionHandle, SessionKey, SessionStatus, SupervisorError};
use crate::upstream::UpstreamClient;

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SessionSupervisor {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionHandle>>>,
    by_integration_id: Arc<RwLock<HashMap<i32, SessionKey>>>,
    upstream_factory: Arc<dyn Fn() -> Box<dyn UpstreamClient> + Send + Sync>,
    ingest_addr: String,
    recording_mode: RecordingMode,
    session_store_path: String,
    shutdown: CancellationToken,
}

impl SessionSupervisor {
    pub fn new(
        upstream_factory: Arc<dyn Fn() -> Box<dyn UpstreamClient> + Send + Sync>,
        ingest_addr: String,
        recording_mode: RecordingMode,
        session_store_path: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            by_integration_id: Arc::new(RwLock::new(HashMap::new())),
            upstream_factory,
            ingest_addr,
            recording_mode,
            session_store_path,
            shutdown,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn register_integration_id(&self, user_integration_id: i32, key: SessionKey) {
        self.by_integration_id.write().await.insert(user_integration_id, key);
    }

    pub async fn connect(&self, user_id: Uuid, integration_type: IntegrationType) -> Result<ConnectOutcome, SupervisorError> {
        let key = SessionKey { user_id, integration_type };

        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(&key) {
                let (tx, rx) = oneshot::channel();
                if handle.commands.send(SessionCommand::Status { reply: tx }).await.is_ok() {
                    if let Ok(status) = rx.await {
                        if status.state == crate::session::types::SessionState::Connected {
                            return Err(SupervisorError::AlreadyConnected(key));
                        }
                    }
                }
            }
        }

        let (qr_tx, qr_rx) = oneshot::channel();
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(32);

        let args = SessionArgs {
            key,
            upstream: (self.upstream_factory)(),
            ingest_addr: self.ingest_addr.clone(),
            commands: cmd_rx,
            qr_ready: Some(qr_tx),
            supervisor_integration_registry: self.by_integration_id.clone(),
            recorder: SessionRecorder::new(self.recording_mode, &self.session_store_path, &key),
            shutdown: self.shutdown.child_token(),
        };

        tokio::spawn(run_session(args));

        self.sessions.write().await.insert(key, SessionHandle { commands: cmd_tx });
        metrics::gauge!("session_handles_active", self.sessions.read().await.len() as f64);

        match tokio::time::timeout(FIRST_ARTIFACT_TIMEOUT, qr_rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(SupervisorError::Internal("session task dropped before pairing".to_string())),
            Err(_) => Err(SupervisorError::QrTimeout),
        }
    }

    pub async fn disconnect(&self, user_id: Uuid, integration_type: IntegrationType) -> Result<(), SupervisorError> {
        let key = SessionKey { user_id, integration_type };
        let handle = {
            let sessions = self.sessions.read().await;
            sessions.get(&key).cloned()
        }
        .ok_or(SupervisorError::NotFound(key))?;

        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(SessionCommand::Disconnect { reply: tx })
            .await
            .map_err(|_| SupervisorError::SessionGone)?;
        rx.await.map_err(|_| SupervisorError::SessionGone)?;

        self.sessions.write().await.remove(&key);
        metrics::gauge!("session_handles_active", self.sessions.read().await.len() as f64);
        Ok(())
    }

    pub async fn status(&self, user_id: Uuid, integration_type: IntegrationType) -> Result<SessionStatus, SupervisorError> {
        let key = SessionKey { user_id, integration_type };
        let handle = {
            let sessions = self.sessions.read().await;
            sessions.get(&key).cloned()
        }
        .ok_or(SupervisorError::NotFound(key))?;

        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(SessionCommand::Status { reply: tx })
            .await
            .map_err(|_| SupervisorError::SessionGone)?;
        rx.await.map_err(|_| SupervisorError::SessionGone)
    }

    /// Routes a Core-initiated outbound dispatch to the session owning
    /// `user_integration_id`, per the Bridge control surface.
    pub async fn dispatch_outbound(
        &self,
        user_integration_id: i32,
        client_msg_uuid: Uuid,
        convo_id: String,
        body: String,
    ) -> Result<String, SupervisorError> {
        let key = *self
            .by_integration_id
            .read()
            .await
            .get(&user_integration_id)
            .ok_or(SupervisorError::Internal(format!(
                "no session owns user_integration_id {user_integration_id}"
            )))?;

        let handle = {
            let sessions = self.sessions.read().await;
            sessions.get(&key).cloned()
        }
        .ok_or(SupervisorError::NotFound(key))?;

        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(SessionCommand::DispatchOutbound {
                client_msg_uuid,
                convo_id,
                body,
                reply: tx,
            })
            .await
            .map_err(|_| SupervisorError::SessionGone)?;

        match tokio::time::timeout(DISPATCH_TIMEOUT, rx).await {
            Ok(Ok(Ok(upstream_message_id))) => Ok(upstream_message_id),
            Ok(Ok(Err(reason))) => Err(SupervisorError::Internal(reason)),
            Ok(Err(_)) => Err(SupervisorError::SessionGone),
            Err(_) => Err(SupervisorError::Internal("dispatch timed out".to_string())),
        }
    }

    pub async fn shutdown_all(&self) {
        self.shutdown.cancel();
        for (_, handle) in self.sessions.write().await.drain() {
            let (tx, rx) = oneshot::channel();
            if handle.commands.send(SessionCommand::Disconnect { reply: tx }).await.is_ok() {
                let _ = rx.await;
            }
        }
    }
}
