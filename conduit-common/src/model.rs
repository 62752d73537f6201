//! Platform-agnostic conversation/message/contact model.
//!
//! These types carry no storage concerns (no `seq`, no `FromRow`) — they are
//! the shape the Normalizer produces and the shape carried over the wire to
//! the Core. The Core's own row types add `seq` and timestamps on top.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which upstream platform a [`UserIntegration`] speaks to. Only one variant
/// ships today; the type exists so adding a second platform never touches
/// call sites that match on it defensively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    Whatsapp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    Error,
    QrGenerated,
    Paired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Individual,
    Group,
    Broadcast,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Member,
    Admin,
    Owner,
    Moderator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Contact,
    Sticker,
    Poll,
    Reaction,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

/// A link between one `User` and one external messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIntegration {
    pub id: i32,
    pub user_id: Uuid,
    pub integration_type: IntegrationType,
    pub external_id: String,
    pub status: ConnectionStatus,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub user_integration_id: i32,
    pub external_conversation_id: String,
    pub conversation_type: ConversationType,
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
    pub platform_metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationParticipant {
    pub conversation_external_id: String,
    pub external_user_id: String,
    pub display_name: Option<String>,
    pub role: ParticipantRole,
    pub is_active: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub conversation_external_id: String,
    pub external_message_id: String,
    pub sender_external_id: String,
    pub message_type: MessageType,
    pub content: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub reply_to_external_id: Option<String>,
    pub is_deleted: bool,
    pub platform_metadata: HashMap<String, String>,
    pub media: Option<MessageMedia>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMedia {
    pub media_type: MediaType,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub download_status: DownloadStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub user_integration_id: i32,
    pub external_contact_id: String,
    pub display_name: String,
    pub phone_number: Option<String>,
    pub avatar_url: Option<String>,
    pub is_blocked: bool,
    pub is_favorite: bool,
}

/// A decoded JWT subject carried on the sync API's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);
