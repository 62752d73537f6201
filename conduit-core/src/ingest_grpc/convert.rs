use std::collections::HashMap;

use conduit_common::model as m;
use conduit_proto as p;

pub fn conversation_type_from_proto(t: i32) -> m::ConversationType {
    match p::ConversationType::try_from(t).unwrap_or(p::ConversationType::Unspecified) {
        p::ConversationType::Group => m::ConversationType::Group,
        p::ConversationType::Broadcast => m::ConversationType::Broadcast,
        p::ConversationType::Channel => m::ConversationType::Channel,
        _ => m::ConversationType::Individual,
    }
}

pub fn participant_role_from_proto(r: i32) -> m::ParticipantRole {
    match p::ParticipantRole::try_from(r).unwrap_or(p::ParticipantRole::Unspecified) {
        p::ParticipantRole::Admin => m::ParticipantRole::Admin,
        p::ParticipantRole::Owner => m::ParticipantRole::Owner,
        p::ParticipantRole::Moderator => m::ParticipantRole::Moderator,
        _ => m::ParticipantRole::Member,
    }
}

pub fn message_type_from_proto(t: i32) -> m::MessageType {
    match p::MessageType::try_from(t).unwrap_or(p::MessageType::Unspecified) {
        p::MessageType::Image => m::MessageType::Image,
        p::MessageType::Video => m::MessageType::Video,
        p::MessageType::Audio => m::MessageType::Audio,
        p::MessageType::Document => m::MessageType::Document,
        p::MessageType::Location => m::MessageType::Location,
        p::MessageType::Contact => m::MessageType::Contact,
        p::MessageType::Sticker => m::MessageType::Sticker,
        p::MessageType::Poll => m::MessageType::Poll,
        p::MessageType::Reaction => m::MessageType::Reaction,
        p::MessageType::System => m::MessageType::System,
        _ => m::MessageType::Text,
    }
}

pub fn delivery_status_from_proto(s: i32) -> m::DeliveryStatus {
    match p::DeliveryStatus::try_from(s).unwrap_or(p::DeliveryStatus::Unspecified) {
        p::DeliveryStatus::Delivered => m::DeliveryStatus::Delivered,
        p::DeliveryStatus::Read => m::DeliveryStatus::Read,
        p::DeliveryStatus::Failed => m::DeliveryStatus::Failed,
        _ => m::DeliveryStatus::Sent,
    }
}

pub fn conversation_from_proto(user_integration_id: i32, proto: &p::ConversationProto) -> m::Conversation {
    m::Conversation {
        user_integration_id,
        external_conversation_id: proto.external_conversation_id.clone(),
        conversation_type: conversation_type_from_proto(proto.conversation_type),
        name: non_empty(&proto.name),
        avatar_url: non_empty(&proto.avatar_url),
        unread_count: 0,
        unread_mention_count: 0,
        total_message_count: 0,
        last_message_at: None,
        is_archived: proto.is_archived,
        is_pinned: proto.is_pinned,
        is_muted: proto.is_muted,
        mute_until: None,
        platform_metadata: proto.platform_metadata.clone(),
    }
}

pub fn participant_from_proto(conversation_external_id: &str, proto: &p::ParticipantProto) -> m::ConversationParticipant {
    m::ConversationParticipant {
        conversation_external_id: conversation_external_id.to_string(),
        external_user_id: proto.external_user_id.clone(),
        display_name: non_empty(&proto.display_name),
        role: participant_role_from_proto(proto.role),
        is_active: proto.is_active,
        joined_at: None,
    }
}

pub fn message_from_proto(proto: &p::MessageProto) -> m::Message {
    m::Message {
        conversation_external_id: String::new(),
        external_message_id: proto.external_message_id.clone(),
        sender_external_id: proto.sender_external_id.clone(),
        message_type: message_type_from_proto(proto.message_type),
        content: non_empty(&proto.content),
        delivery_status: delivery_status_from_proto(proto.delivery_status),
        timestamp: conduit_common::upstream_event_timestamp(proto.timestamp_secs),
        reply_to_external_id: non_empty(&proto.reply_to_external_id),
        is_deleted: proto.is_deleted,
        platform_metadata: proto.platform_metadata.clone(),
        media: proto.media.as_ref().map(media_from_proto),
    }
}

fn media_from_proto(proto: &p::MessageMediaProto) -> m::MessageMedia {
    let media_type = match proto.media_type.as_str() {
        "video" => m::MediaType::Video,
        "audio" => m::MediaType::Audio,
        "document" => m::MediaType::Document,
        "sticker" => m::MediaType::Sticker,
        _ => m::MediaType::Image,
    };
    m::MessageMedia {
        media_type,
        url: non_empty(&proto.url),
        mime_type: non_empty(&proto.mime_type),
        file_size: if proto.file_size > 0 { Some(proto.file_size) } else { None },
        width: if proto.width > 0 { Some(proto.width) } else { None },
        height: if proto.height > 0 { Some(proto.height) } else { None },
        download_status: if proto.url.is_empty() {
            m::DownloadStatus::Failed
        } else {
            m::DownloadStatus::Pending
        },
    }
}

pub fn contact_from_proto(proto: &p::ContactProto) -> m::Contact {
    m::Contact {
        user_integration_id: 0,
        external_contact_id: proto.external_contact_id.clone(),
        display_name: proto.display_name.clone(),
        phone_number: non_empty(&proto.phone_number),
        avatar_url: non_empty(&proto.avatar_url),
        is_blocked: proto.is_blocked,
        is_favorite: proto.is_favorite,
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[allow(dead_code)]
pub fn metadata_map(m: &HashMap<String, String>) -> HashMap<String, String> {
    m.clone()
}
