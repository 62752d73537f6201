use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use conduit_common::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::{queries, DbPool};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    since_seq: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SyncPage {
    latest_seq: i64,
    has_more: bool,
    total_count: i64,
}

#[derive(Debug, Serialize)]
struct ConversationsEnvelope {
    conversations: Vec<conduit_common::model::Conversation>,
    #[serde(flatten)]
    page: SyncPage,
}

#[derive(Debug, Serialize)]
struct ContactsEnvelope {
    contacts: Vec<conduit_common::model::Contact>,
    #[serde(flatten)]
    page: SyncPage,
}

#[derive(Debug, Serialize)]
struct MessagesEnvelope {
    messages: Vec<MessageViewFields>,
    #[serde(flatten)]
    page: SyncPage,
}

async fn ensure_owns_integration(
    pool: &DbPool,
    user_id: Uuid,
    integration_id: i32,
) -> Result<(), ApiError> {
    let integration = queries::get_user_integration(pool, integration_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("integration {integration_id}")))?;

    if integration.user_id != user_id {
        return Err(CoreError::Unauthorized("integration belongs to another user".into()).into());
    }

    Ok(())
}

/// `limit.unwrap_or(default).clamp(1, max)` — never trust a client-supplied
/// page size outside the documented range.
fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

pub async fn get_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(integration_id): Path<i32>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<ConversationsEnvelope>, ApiError> {
    ensure_owns_integration(&state.pool, auth.user_id, integration_id).await?;

    let since_seq = params.since_seq.unwrap_or(0);
    let limit = clamp_limit(params.limit, 100, 1000);

    let page = queries::list_conversations_since(&state.pool, integration_id, since_seq, limit).await?;

    Ok(Json(ConversationsEnvelope {
        conversations: page.items.iter().map(|r| r.to_model()).collect(),
        page: SyncPage {
            latest_seq: page.latest_seq,
            has_more: page.has_more,
            total_count: page.total_count,
        },
    }))
}

pub async fn get_contacts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(integration_id): Path<i32>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<ContactsEnvelope>, ApiError> {
    ensure_owns_integration(&state.pool, auth.user_id, integration_id).await?;

    let since_seq = params.since_seq.unwrap_or(0);
    let limit = clamp_limit(params.limit, 500, 1000);

    let page = queries::list_contacts_since(&state.pool, integration_id, since_seq, limit).await?;

    Ok(Json(ContactsEnvelope {
        contacts: page.items.iter().map(|r| r.to_model()).collect(),
        page: SyncPage {
            latest_seq: page.latest_seq,
            has_more: page.has_more,
            total_count: page.total_count,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageViewFields {
    pub external_message_id: String,
    pub sender_external_id: String,
    pub message_type: String,
    pub content: Option<String>,
    pub delivery_status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub reply_to_external_id: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
    pub is_deleted: bool,
}

impl From<&crate::db::models::MessageRow> for MessageViewFields {
    fn from(row: &crate::db::models::MessageRow) -> Self {
        Self {
            external_message_id: row.external_message_id.clone(),
            sender_external_id: row.sender_external_id.clone(),
            message_type: row.message_type.clone(),
            content: row.content.clone(),
            delivery_status: row.delivery_status.clone(),
            timestamp: row.timestamp,
            reply_to_external_id: row.reply_to_external_id.clone(),
            reply_to_message_id: row.reply_to_message_id,
            is_deleted: row.is_deleted,
        }
    }
}

pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(integration_id): Path<i32>,
    Query(params): Query<SyncQuery>,
) -> Result<Json<MessagesEnvelope>, ApiError> {
    ensure_owns_integration(&state.pool, auth.user_id, integration_id).await?;

    let since_seq = params.since_seq.unwrap_or(0);
    let limit = clamp_limit(params.limit, 1500, 2000);

    let page =
        queries::list_messages_for_integration_since(&state.pool, integration_id, since_seq, limit)
            .await?;

    Ok(Json(MessagesEnvelope {
        messages: page.items.iter().map(MessageViewFields::from).collect(),
        page: SyncPage {
            latest_seq: page.latest_seq,
            has_more: page.has_more,
            total_count: page.total_count,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub external_id: String,
    pub display_name: Option<String>,
}

pub async fn get_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(integration_id): Path<i32>,
) -> Result<Json<StatusResponse>, ApiError> {
    ensure_owns_integration(&state.pool, auth.user_id, integration_id).await?;

    let integration = queries::get_user_integration(&state.pool, integration_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("integration {integration_id}")))?;

    Ok(Json(StatusResponse {
        status: integration.status,
        external_id: integration.external_id,
        display_name: integration.display_name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PostOutboxRequest {
    pub client_msg_uuid: Uuid,
    pub account_id: i32,
    pub convo_id: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct PostOutboxResponse {
    pub client_msg_uuid: Uuid,
    pub status: String,
}

pub async fn post_outbox(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PostOutboxRequest>,
) -> Result<(StatusCode, Json<PostOutboxResponse>), ApiError> {
    ensure_owns_integration(&state.pool, auth.user_id, req.account_id).await?;

    if req.body.is_empty() {
        return Err(CoreError::InvalidArgument("body must not be empty".into()).into());
    }

    let row = queries::enqueue_outbox(
        &state.pool,
        req.client_msg_uuid,
        req.account_id,
        &req.convo_id,
        &req.body,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PostOutboxResponse {
            client_msg_uuid: row.client_msg_uuid,
            status: row.status,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_respects_range_and_default() {
        assert_eq!(clamp_limit(None, 100, 1000), 100);
        assert_eq!(clamp_limit(Some(0), 100, 1000), 1);
        assert_eq!(clamp_limit(Some(5000), 100, 1000), 1000);
        assert_eq!(clamp_limit(Some(250), 100, 1000), 250);
    }
}
