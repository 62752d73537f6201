//! The abstract upstream event taxonomy the Normalizer consumes.
//!
//! These are not wire types — the Bridge's concrete upstream adapter is
//! responsible for mapping whatever the real upstream client library hands
//! it into this shape before calling the normalizer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamConversation {
    pub external_id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub participant_external_ids: Vec<String>,
    pub is_broadcast: bool,
    pub is_channel: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamMessageBody {
    pub conversation_text: Option<String>,
    pub extended_text: Option<String>,
    pub image_caption: Option<String>,
    pub video_caption: Option<String>,
    pub audio: bool,
    pub document_title: Option<String>,
    pub media_url: Option<String>,
    pub media_mime_type: Option<String>,
    pub media_file_size: Option<i64>,
    pub media_width: Option<i32>,
    pub media_height: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamMessageInfo {
    pub conversation_external_id: String,
    pub message_external_id: String,
    pub sender_external_id: Option<String>,
    pub quoted_message_external_id: Option<String>,
    pub timestamp_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamReceipt {
    pub message_external_ids: Vec<String>,
    pub kind: ReceiptKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiptKind {
    Delivered,
    Read,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamContact {
    pub external_id: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub push_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamGroupInfo {
    pub conversation_external_id: String,
    pub name: Option<String>,
    pub participants: Vec<UpstreamGroupParticipant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamGroupParticipant {
    pub external_user_id: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

/// The open set of event shapes an upstream session can emit. Matched
/// exhaustively by the normalizer; anything genuinely unknown arrives here
/// as `Unrecognized` rather than failing to compile the match.
#[derive(Debug, Clone, Serialize)]
pub enum UpstreamEvent {
    HistoryBundle {
        conversations: Vec<UpstreamConversation>,
        messages_by_conversation: Vec<(String, Vec<(UpstreamMessageInfo, UpstreamMessageBody)>)>,
    },
    LiveMessage {
        info: UpstreamMessageInfo,
        body: UpstreamMessageBody,
    },
    Receipt(UpstreamReceipt),
    ContactUpdate(UpstreamContact),
    PushNameUpdate {
        external_id: String,
        push_name: String,
    },
    GroupInfoUpdate(UpstreamGroupInfo),
    JoinedGroup(UpstreamGroupInfo),
    Presence {
        external_id: String,
        is_online: bool,
    },
    Connected,
    Disconnected {
        reason: Option<String>,
    },
    LoggedOut,
    Unrecognized {
        kind: String,
        raw: HashMap<String, String>,
    },
}

pub fn secs_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}
