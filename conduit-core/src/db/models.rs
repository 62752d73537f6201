//! Row types returned straight from Postgres. These carry storage concerns
//! (`seq`, internal UUID primary keys, JSON-encoded metadata columns) that
//! `conduit_common::model` deliberately omits; `to_model()` on each strips
//! them back down to the wire-level type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conduit_common::model as m;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct UserIntegrationRow {
    pub id: i32,
    pub user_id: Uuid,
    pub integration_type: String,
    pub external_id: String,
    pub status: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Json<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub seq: i64,
    pub user_integration_id: i32,
    pub external_conversation_id: String,
    pub conversation_type: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub unread_count: i64,
    pub unread_mention_count: i64,
    pub total_message_count: i64,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub mute_until: Option<DateTime<Utc>>,
    pub platform_metadata: Json<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRow {
    pub fn to_model(&self) -> m::Conversation {
        m::Conversation {
            user_integration_id: self.user_integration_id,
            external_conversation_id: self.external_conversation_id.clone(),
            conversation_type: parse_conversation_type(&self.conversation_type),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            unread_count: self.unread_count,
            unread_mention_count: self.unread_mention_count,
            total_message_count: self.total_message_count,
            last_message_at: self.last_message_at,
            is_archived: self.is_archived,
            is_pinned: self.is_pinned,
            is_muted: self.is_muted,
            mute_until: self.mute_until,
            platform_metadata: self.platform_metadata.0.clone(),
        }
    }
}

fn parse_conversation_type(s: &str) -> m::ConversationType {
    match s {
        "group" => m::ConversationType::Group,
        "broadcast" => m::ConversationType::Broadcast,
        "channel" => m::ConversationType::Channel,
        _ => m::ConversationType::Individual,
    }
}

pub fn conversation_type_str(t: m::ConversationType) -> &'static str {
    match t {
        m::ConversationType::Individual => "individual",
        m::ConversationType::Group => "group",
        m::ConversationType::Broadcast => "broadcast",
        m::ConversationType::Channel => "channel",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub seq: i64,
    pub conversation_id: Uuid,
    pub external_message_id: String,
    pub sender_external_id: String,
    pub message_type: String,
    pub content: Option<String>,
    pub delivery_status: String,
    pub timestamp: DateTime<Utc>,
    pub reply_to_external_id: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub platform_metadata: Json<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
}

/// `upsert_message`'s `RETURNING` row plus the `xmax = 0` insert/update
/// discriminant, so the caller can tell a fresh row from a replayed one.
#[derive(Debug, FromRow)]
pub struct UpsertedMessageRow {
    #[sqlx(flatten)]
    pub row: MessageRow,
    pub inserted: bool,
}

pub fn message_type_str(t: m::MessageType) -> &'static str {
    match t {
        m::MessageType::Text => "text",
        m::MessageType::Image => "image",
        m::MessageType::Video => "video",
        m::MessageType::Audio => "audio",
        m::MessageType::Document => "document",
        m::MessageType::Location => "location",
        m::MessageType::Contact => "contact",
        m::MessageType::Sticker => "sticker",
        m::MessageType::Poll => "poll",
        m::MessageType::Reaction => "reaction",
        m::MessageType::System => "system",
    }
}

pub fn delivery_status_str(s: m::DeliveryStatus) -> &'static str {
    match s {
        m::DeliveryStatus::Sent => "sent",
        m::DeliveryStatus::Delivered => "delivered",
        m::DeliveryStatus::Read => "read",
        m::DeliveryStatus::Failed => "failed",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    pub id: Uuid,
    pub seq: i64,
    pub user_integration_id: i32,
    pub external_contact_id: String,
    pub display_name: String,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    pub is_blocked: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactRow {
    pub fn to_model(&self) -> m::Contact {
        m::Contact {
            user_integration_id: self.user_integration_id,
            external_contact_id: self.external_contact_id.clone(),
            display_name: self.display_name.clone(),
            phone_number: self.phone_number.clone(),
            avatar_url: self.avatar_url.clone(),
            is_blocked: self.is_blocked,
            is_favorite: self.is_favorite,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OutboxRow {
    pub client_msg_uuid: Uuid,
    pub account_id: i32,
    pub convo_id: String,
    pub body: String,
    pub server_msg_id: Option<String>,
    pub status: String,
    pub last_error: Option<String>,
    pub retry_count: i32,
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OutboxRow {
    /// Mirrors the client-visible state machine `queued -> sending ->
    /// sent/failed/retry`.
    pub fn can_retry(&self, max_retries: i32) -> bool {
        self.retry_count < max_retries && (self.status == "queued" || self.status == "retry")
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub seq: i64,
    pub id: Uuid,
    pub account_id: i32,
    pub convo_id: String,
    pub event_type: String,
    pub payload: Json<serde_json::Value>,
    pub wa_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outbox(status: &str, retry_count: i32) -> OutboxRow {
        OutboxRow {
            client_msg_uuid: Uuid::new_v4(),
            account_id: 1,
            convo_id: "c1".to_string(),
            body: "hi".to_string(),
            server_msg_id: None,
            status: status.to_string(),
            last_error: None,
            retry_count,
            next_retry_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn can_retry_respects_max_retries_and_terminal_status() {
        assert!(sample_outbox("queued", 0).can_retry(7));
        assert!(sample_outbox("retry", 6).can_retry(7));
        assert!(!sample_outbox("retry", 7).can_retry(7));
        assert!(!sample_outbox("sent", 0).can_retry(7));
        assert!(!sample_outbox("failed", 0).can_retry(7));
    }

    #[test]
    fn conversation_type_round_trips_through_string_form() {
        for t in [
            m::ConversationType::Individual,
            m::ConversationType::Group,
            m::ConversationType::Broadcast,
            m::ConversationType::Channel,
        ] {
            assert_eq!(parse_conversation_type(conversation_type_str(t)), t);
        }
    }
}
