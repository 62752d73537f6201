use conduit_proto::integration_service_server::IntegrationService;
use conduit_proto::{
    CreateUserIntegrationRequest, CreateUserIntegrationResponse, ProcessMessageRequest,
    ProcessMessageResponse, SyncContactsRequest, SyncContactsResponse, SyncConversationsRequest,
    SyncConversationsResponse, SyncMessagesRequest, SyncMessagesResponse,
    UpdateConnectionStatusRequest, UpdateConnectionStatusResponse,
    UpdateConversationStateRequest, UpdateConversationStateResponse,
};
use tonic::{Request, Response, Status, Streaming};
use uuid::Uuid;

use crate::db::{queries, DbPool};

use super::convert;

pub struct IntegrationServiceImpl {
    pool: DbPool,
}

impl IntegrationServiceImpl {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn invalid_argument(msg: impl Into<String>) -> Status {
    Status::invalid_argument(msg.into())
}

fn unavailable(err: impl std::fmt::Display) -> Status {
    Status::unavailable(err.to_string())
}

#[tonic::async_trait]
impl IntegrationService for IntegrationServiceImpl {
    async fn create_user_integration(
        &self,
        request: Request<CreateUserIntegrationRequest>,
    ) -> Result<Response<CreateUserIntegrationResponse>, Status> {
        let req = request.into_inner();
        let user_id = Uuid::parse_str(&req.user_id).map_err(|e| invalid_argument(e.to_string()))?;

        let row = queries::get_or_create_user_integration(
            &self.pool,
            user_id,
            &req.integration_type,
            &req.platform_user_id,
        )
        .await
        .map_err(unavailable)?;

        Ok(Response::new(CreateUserIntegrationResponse {
            user_integration_id: row.id,
        }))
    }

    async fn update_connection_status(
        &self,
        request: Request<UpdateConnectionStatusRequest>,
    ) -> Result<Response<UpdateConnectionStatusResponse>, Status> {
        let req = request.into_inner();
        let ctx = req.ctx.ok_or_else(|| invalid_argument("missing ctx"))?;

        let status = match conduit_proto::ConnectionStatus::try_from(req.status)
            .unwrap_or(conduit_proto::ConnectionStatus::Unspecified)
        {
            conduit_proto::ConnectionStatus::Connected => conduit_common::model::ConnectionStatus::Connected,
            conduit_proto::ConnectionStatus::Connecting => conduit_common::model::ConnectionStatus::Connecting,
            conduit_proto::ConnectionStatus::Disconnected => conduit_common::model::ConnectionStatus::Disconnected,
            conduit_proto::ConnectionStatus::Error => conduit_common::model::ConnectionStatus::Error,
            conduit_proto::ConnectionStatus::QrGenerated => conduit_common::model::ConnectionStatus::QrGenerated,
            conduit_proto::ConnectionStatus::Paired => conduit_common::model::ConnectionStatus::Paired,
            conduit_proto::ConnectionStatus::Unspecified => conduit_common::model::ConnectionStatus::Disconnected,
        };

        queries::update_connection_status(&self.pool, ctx.user_integration_id, status, &req.metadata)
            .await
            .map_err(unavailable)?;

        Ok(Response::new(UpdateConnectionStatusResponse {}))
    }

    async fn sync_conversations(
        &self,
        request: Request<Streaming<SyncConversationsRequest>>,
    ) -> Result<Response<SyncConversationsResponse>, Status> {
        let mut stream = request.into_inner();
        let mut processed_count = 0i64;
        let mut total_batches = 0i32;

        while let Some(req) = stream.message().await? {
            let ctx = req.ctx.ok_or_else(|| invalid_argument("missing ctx"))?;
            total_batches = req.batch_number;

            for conv_proto in &req.conversations {
                if conv_proto.external_conversation_id.is_empty() {
                    tracing::warn!("skipping conversation with empty external id");
                    continue;
                }
                let conv = convert::conversation_from_proto(ctx.user_integration_id, conv_proto);
                let row = match queries::upsert_conversation(&self.pool, ctx.user_integration_id, &conv).await {
                    Ok(row) => row,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping bad conversation record");
                        continue;
                    }
                };
                for p in &conv_proto.participants {
                    let participant = convert::participant_from_proto(&conv.external_conversation_id, p);
                    if let Err(err) = queries::upsert_participant(&self.pool, row.id, &participant).await {
                        tracing::warn!(error = %err, "skipping bad participant record");
                    }
                }
                processed_count += 1;
            }

            metrics::counter!("ingest_batches_total", 1, "kind" => "conversations");

            if req.is_final_batch {
                break;
            }
        }

        metrics::counter!("ingest_records_total", processed_count as u64, "kind" => "conversations");

        Ok(Response::new(SyncConversationsResponse {
            processed_count,
            total_batches,
        }))
    }

    async fn sync_contacts(
        &self,
        request: Request<Streaming<SyncContactsRequest>>,
    ) -> Result<Response<SyncContactsResponse>, Status> {
        let mut stream = request.into_inner();
        let mut processed_count = 0i64;

        while let Some(req) = stream.message().await? {
            let ctx = req.ctx.ok_or_else(|| invalid_argument("missing ctx"))?;

            for contact_proto in &req.contacts {
                if contact_proto.external_contact_id.is_empty() {
                    tracing::warn!("skipping contact with empty external id");
                    continue;
                }
                let contact = convert::contact_from_proto(contact_proto);
                if let Err(err) = queries::upsert_contact(&self.pool, ctx.user_integration_id, &contact).await {
                    tracing::warn!(error = %err, "skipping bad contact record");
                    continue;
                }
                processed_count += 1;
            }

            metrics::counter!("ingest_batches_total", 1, "kind" => "contacts");

            if req.is_final_batch {
                break;
            }
        }

        metrics::counter!("ingest_records_total", processed_count as u64, "kind" => "contacts");

        Ok(Response::new(SyncContactsResponse { processed_count }))
    }

    async fn sync_messages(
        &self,
        request: Request<Streaming<SyncMessagesRequest>>,
    ) -> Result<Response<SyncMessagesResponse>, Status> {
        let mut stream = request.into_inner();
        let mut processed_count = 0i64;

        while let Some(req) = stream.message().await? {
            let ctx = req.ctx.ok_or_else(|| invalid_argument("missing ctx"))?;

            let conversation_id = match queries::get_conversation_id(
                &self.pool,
                ctx.user_integration_id,
                &req.conversation_external_id,
            )
            .await
            .map_err(unavailable)?
            {
                Some(id) => id,
                None => {
                    tracing::warn!(
                        conversation_external_id = %req.conversation_external_id,
                        "sync_messages: conversation not yet known, skipping batch"
                    );
                    continue;
                }
            };

            for msg_proto in &req.messages {
                if msg_proto.external_message_id.is_empty() {
                    tracing::warn!("skipping message with empty external id");
                    continue;
                }
                let mut message = convert::message_from_proto(msg_proto);
                message.conversation_external_id = req.conversation_external_id.clone();
                if let Err(err) = queries::upsert_message(&self.pool, conversation_id, &message).await {
                    tracing::warn!(error = %err, "skipping bad message record");
                    continue;
                }
                processed_count += 1;
            }

            metrics::counter!("ingest_batches_total", 1, "kind" => "messages");

            if req.is_final_batch {
                break;
            }
        }

        metrics::counter!("ingest_records_total", processed_count as u64, "kind" => "messages");

        Ok(Response::new(SyncMessagesResponse { processed_count }))
    }

    async fn process_message(
        &self,
        request: Request<ProcessMessageRequest>,
    ) -> Result<Response<ProcessMessageResponse>, Status> {
        let req = request.into_inner();
        let ctx = req.ctx.ok_or_else(|| invalid_argument("missing ctx"))?;
        let msg_proto = req.message.ok_or_else(|| invalid_argument("missing message"))?;

        if msg_proto.conversation_external_id.is_empty() {
            return Err(invalid_argument("message missing conversation_external_id"));
        }

        let conversation_id = queries::get_conversation_id(
            &self.pool,
            ctx.user_integration_id,
            &msg_proto.conversation_external_id,
        )
        .await
        .map_err(unavailable)?;

        // A live message may arrive for a conversation the bridge hasn't
        // synced yet; surfaced as a retryable precondition failure rather
        // than silently dropped.
        let conversation_id = match conversation_id {
            Some(id) => id,
            None => {
                tracing::debug!("process_message: conversation missing, message dropped");
                return Err(Status::failed_precondition("conversation not synced"));
            }
        };

        let mut message = convert::message_from_proto(&msg_proto);
        message.conversation_external_id = msg_proto.conversation_external_id.clone();
        let row = queries::upsert_message(&self.pool, conversation_id, &message)
            .await
            .map_err(unavailable)?;

        metrics::counter!("ingest_records_total", 1, "kind" => "live_message");

        Ok(Response::new(ProcessMessageResponse {
            internal_message_id: row.id.to_string(),
        }))
    }

    async fn update_conversation_state(
        &self,
        request: Request<UpdateConversationStateRequest>,
    ) -> Result<Response<UpdateConversationStateResponse>, Status> {
        let req = request.into_inner();
        let ctx = req.ctx.ok_or_else(|| invalid_argument("missing ctx"))?;
        let state = req.state.ok_or_else(|| invalid_argument("missing state"))?;

        let updated = queries::update_conversation_state(
            &self.pool,
            ctx.user_integration_id,
            &req.conversation_external_id,
            state.is_archived,
            state.is_pinned,
            state.is_muted,
            conduit_common::secs_to_datetime(state.mute_until_secs),
        )
        .await
        .map_err(unavailable)?;

        if !updated {
            return Err(Status::not_found("conversation not found"));
        }

        Ok(Response::new(UpdateConversationStateResponse {}))
    }
}
