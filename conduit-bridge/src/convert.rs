//! Model -> proto conversions, the mirror image of conduit-core's ingest_grpc
//! convert module. Proto string/int fields are zero-valued rather than
//! `Option`, so `None` collapses to empty string / zero here.

use conduit_common::model as m;
use conduit_proto as p;

pub fn conversation_type_to_proto(t: m::ConversationType) -> i32 {
    (match t {
        m::ConversationType::Individual => p::ConversationType::Individual,
        m::ConversationType::Group => p::ConversationType::Group,
        m::ConversationType::Broadcast => p::ConversationType::Broadcast,
        m::ConversationType::Channel => p::ConversationType::Channel,
    }) as i32
}

pub fn participant_role_to_proto(r: m::ParticipantRole) -> i32 {
    (match r {
        m::ParticipantRole::Member => p::ParticipantRole::Member,
        m::ParticipantRole::Admin => p::ParticipantRole::Admin,
        m::ParticipantRole::Owner => p::ParticipantRole::Owner,
        m::ParticipantRole::Moderator => p::ParticipantRole::Moderator,
    }) as i32
}

pub fn message_type_to_proto(t: m::MessageType) -> i32 {
    (match t {
        m::MessageType::Text => p::MessageType::Text,
        m::MessageType::Image => p::MessageType::Image,
        m::MessageType::Video => p::MessageType::Video,
        m::MessageType::Audio => p::MessageType::Audio,
        m::MessageType::Document => p::MessageType::Document,
        m::MessageType::Location => p::MessageType::Location,
        m::MessageType::Contact => p::MessageType::Contact,
        m::MessageType::Sticker => p::MessageType::Sticker,
        m::MessageType::Poll => p::MessageType::Poll,
        m::MessageType::Reaction => p::MessageType::Reaction,
        m::MessageType::System => p::MessageType::System,
    }) as i32
}

pub fn delivery_status_to_proto(s: m::DeliveryStatus) -> i32 {
    (match s {
        m::DeliveryStatus::Sent => p::DeliveryStatus::Sent,
        m::DeliveryStatus::Delivered => p::DeliveryStatus::Delivered,
        m::DeliveryStatus::Read => p::DeliveryStatus::Read,
        m::DeliveryStatus::Failed => p::DeliveryStatus::Failed,
    }) as i32
}

pub fn connection_status_to_proto(s: m::ConnectionStatus) -> i32 {
    (match s {
        m::ConnectionStatus::Connected => p::ConnectionStatus::Connected,
        m::ConnectionStatus::Connecting => p::ConnectionStatus::Connecting,
        m::ConnectionStatus::Disconnected => p::ConnectionStatus::Disconnected,
        m::ConnectionStatus::Error => p::ConnectionStatus::Error,
        m::ConnectionStatus::QrGenerated => p::ConnectionStatus::QrGenerated,
        m::ConnectionStatus::Paired => p::ConnectionStatus::Paired,
    }) as i32
}

pub fn conversation_to_proto(conv: &m::Conversation, participants: Vec<m::ConversationParticipant>) -> p::ConversationProto {
    p::ConversationProto {
        external_conversation_id: conv.external_conversation_id.clone(),
        conversation_type: conversation_type_to_proto(conv.conversation_type),
        name: conv.name.clone().unwrap_or_default(),
        avatar_url: conv.avatar_url.clone().unwrap_or_default(),
        is_archived: conv.is_archived,
        is_pinned: conv.is_pinned,
        is_muted: conv.is_muted,
        platform_metadata: conv.platform_metadata.clone(),
        participants: participants.iter().map(participant_to_proto).collect(),
    }
}

pub fn participant_to_proto(p: &m::ConversationParticipant) -> p::ParticipantProto {
    p::ParticipantProto {
        external_user_id: p.external_user_id.clone(),
        display_name: p.display_name.clone().unwrap_or_default(),
        role: participant_role_to_proto(p.role),
        is_active: p.is_active,
    }
}

pub fn message_to_proto(msg: &m::Message) -> p::MessageProto {
    p::MessageProto {
        external_message_id: msg.external_message_id.clone(),
        sender_external_id: msg.sender_external_id.clone(),
        message_type: message_type_to_proto(msg.message_type),
        content: msg.content.clone().unwrap_or_default(),
        delivery_status: delivery_status_to_proto(msg.delivery_status),
        timestamp_secs: msg.timestamp.timestamp(),
        reply_to_external_id: msg.reply_to_external_id.clone().unwrap_or_default(),
        is_deleted: msg.is_deleted,
        platform_metadata: msg.platform_metadata.clone(),
        media: msg.media.as_ref().map(media_to_proto),
        conversation_external_id: msg.conversation_external_id.clone(),
    }
}

fn media_to_proto(media: &m::MessageMedia) -> p::MessageMediaProto {
    let media_type = match media.media_type {
        m::MediaType::Image => "image",
        m::MediaType::Video => "video",
        m::MediaType::Audio => "audio",
        m::MediaType::Document => "document",
        m::MediaType::Sticker => "sticker",
    };
    p::MessageMediaProto {
        media_type: media_type.to_string(),
        url: media.url.clone().unwrap_or_default(),
        mime_type: media.mime_type.clone().unwrap_or_default(),
        file_size: media.file_size.unwrap_or(0),
        width: media.width.unwrap_or(0),
        height: media.height.unwrap_or(0),
    }
}

pub fn contact_to_proto(contact: &m::Contact) -> p::ContactProto {
    p::ContactProto {
        external_contact_id: contact.external_contact_id.clone(),
        display_name: contact.display_name.clone(),
        phone_number: contact.phone_number.clone().unwrap_or_default(),
        avatar_url: contact.avatar_url.clone().unwrap_or_default(),
        is_blocked: contact.is_blocked,
        is_favorite: contact.is_favorite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_round_trips_optional_fields_to_empty_string() {
        let conv = m::Conversation {
            user_integration_id: 1,
            external_conversation_id: "c1".to_string(),
            conversation_type: m::ConversationType::Group,
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
        let proto = conversation_to_proto(&conv, Vec::new());
        assert_eq!(proto.name, "");
        assert_eq!(proto.conversation_type, p::ConversationType::Group as i32);
    }
}
