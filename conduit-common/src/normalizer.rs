//! Pure, stateless conversion from [`UpstreamEvent`] to the platform-agnostic
//! model. No suspension points, no I/O — every function here is a plain
//! value transformation so it can be unit tested without a runtime.

use std::collections::HashMap;

use crate::error::NormalizeError;
use crate::model::{
    Contact, Conversation, ConversationParticipant, ConversationType, DeliveryStatus,
    DownloadStatus, MediaType, Message, MessageMedia, MessageType, ParticipantRole,
};
use crate::upstream_event::{
    secs_to_datetime, ReceiptKind, UpstreamConversation, UpstreamContact, UpstreamEvent,
    UpstreamGroupInfo, UpstreamMessageBody, UpstreamMessageInfo,
};

/// One unit of persistence work the Supervisor should perform against the
/// Core for a single upstream event. A `HistoryBundle` normalizes to many of
/// these; a `LiveMessage` normalizes to exactly one.
#[derive(Debug, Clone)]
pub enum NormalizedAction {
    UpsertConversations(Vec<Conversation>),
    UpsertContacts(Vec<Contact>),
    UpsertMessages {
        conversation_external_id: String,
        messages: Vec<Message>,
    },
    UpsertParticipants {
        conversation_external_id: String,
        participants: Vec<ConversationParticipant>,
    },
    UpdateDeliveryStatus {
        external_message_ids: Vec<String>,
        status: DeliveryStatus,
    },
    UpdateConnectionStatus(crate::model::ConnectionStatus),
    /// Logged and counted, never surfaced as a hard failure.
    Anomaly(NormalizeError),
}

/// Batch limits from the ingest streaming contract. Kept here (rather than
/// in `conduit-proto`) because the Normalizer is the thing that must slice
/// its output into conforming batches.
pub const MAX_CONVERSATIONS_PER_BATCH: usize = 50;
pub const MAX_CONTACTS_PER_BATCH: usize = 100;
pub const MAX_MESSAGES_PER_BATCH: usize = 200;

pub fn normalize(event: UpstreamEvent) -> Vec<NormalizedAction> {
    match event {
        UpstreamEvent::HistoryBundle {
            conversations,
            messages_by_conversation,
        } => {
            let mut actions = Vec::new();
            actions.push(NormalizedAction::UpsertConversations(
                conversations.iter().map(conversation_from_upstream).collect(),
            ));
            for conv in &conversations {
                if !conv.participant_external_ids.is_empty() {
                    actions.push(NormalizedAction::UpsertParticipants {
                        conversation_external_id: conv.external_id.clone(),
                        participants: conv
                            .participant_external_ids
                            .iter()
                            .map(|id| participant_from_member(&conv.external_id, id))
                            .collect(),
                    });
                }
            }
            for (conversation_external_id, messages) in messages_by_conversation {
                let normalized = messages
                    .into_iter()
                    .map(|(info, body)| message_from_upstream(&info, &body))
                    .collect();
                actions.push(NormalizedAction::UpsertMessages {
                    conversation_external_id,
                    messages: normalized,
                });
            }
            actions
        }
        UpstreamEvent::LiveMessage { info, body } => {
            let conversation_external_id = info.conversation_external_id.clone();
            vec![NormalizedAction::UpsertMessages {
                conversation_external_id,
                messages: vec![message_from_upstream(&info, &body)],
            }]
        }
        UpstreamEvent::Receipt(receipt) => {
            let status = match receipt.kind {
                ReceiptKind::Delivered => DeliveryStatus::Delivered,
                ReceiptKind::Read => DeliveryStatus::Read,
            };
            vec![NormalizedAction::UpdateDeliveryStatus {
                external_message_ids: receipt.message_external_ids,
                status,
            }]
        }
        UpstreamEvent::ContactUpdate(contact) => {
            vec![NormalizedAction::UpsertContacts(vec![contact_from_upstream(
                &contact,
            )])]
        }
        UpstreamEvent::PushNameUpdate {
            external_id,
            push_name,
        } => vec![NormalizedAction::UpsertContacts(vec![Contact {
            user_integration_id: 0,
            external_contact_id: external_id,
            display_name: push_name,
            phone_number: None,
            avatar_url: None,
            is_blocked: false,
            is_favorite: false,
        }])],
        UpstreamEvent::GroupInfoUpdate(info) | UpstreamEvent::JoinedGroup(info) => {
            vec![group_info_to_action(&info)]
        }
        UpstreamEvent::Presence { .. } => Vec::new(),
        UpstreamEvent::Connected => vec![NormalizedAction::UpdateConnectionStatus(
            crate::model::ConnectionStatus::Connected,
        )],
        UpstreamEvent::Disconnected { .. } => vec![NormalizedAction::UpdateConnectionStatus(
            crate::model::ConnectionStatus::Disconnected,
        )],
        UpstreamEvent::LoggedOut => vec![NormalizedAction::UpdateConnectionStatus(
            crate::model::ConnectionStatus::Disconnected,
        )],
        UpstreamEvent::Unrecognized { kind, raw: _ } => {
            tracing::warn!(event_kind = %kind, "unrecognized upstream event");
            vec![NormalizedAction::Anomaly(crate::error::NormalizeError::Unrecognized(kind))]
        }
    }
}

fn conversation_from_upstream(conv: &UpstreamConversation) -> Conversation {
    let conversation_type = if conv.is_broadcast {
        ConversationType::Broadcast
    } else if conv.is_channel {
        ConversationType::Channel
    } else if !conv.participant_external_ids.is_empty() {
        ConversationType::Group
    } else {
        ConversationType::Individual
    };

    Conversation {
        user_integration_id: 0,
        external_conversation_id: conv.external_id.clone(),
        conversation_type,
        name: conv.name.clone(),
        avatar_url: conv.avatar_url.clone(),
        unread_count: 0,
        unread_mention_count: 0,
        total_message_count: 0,
        last_message_at: None,
        is_archived: false,
        is_pinned: false,
        is_muted: false,
        mute_until: None,
        platform_metadata: HashMap::new(),
    }
}

fn participant_from_member(conversation_external_id: &str, external_user_id: &str) -> ConversationParticipant {
    ConversationParticipant {
        conversation_external_id: conversation_external_id.to_string(),
        external_user_id: external_user_id.to_string(),
        display_name: None,
        role: ParticipantRole::Member,
        is_active: true,
        joined_at: None,
    }
}

/// Priority order for deriving a [`MessageType`] + text content out of a
/// body that may carry several populated fields at once: conversation text,
/// then extended text, then image (with caption folded into content), then
/// video, then audio, then document (title folded into content). Anything
/// left unmatched becomes `Text` with a placeholder body rather than being
/// dropped.
fn message_from_upstream(info: &UpstreamMessageInfo, body: &UpstreamMessageBody) -> Message {
    let (message_type, content, media) = if let Some(text) = &body.conversation_text {
        (MessageType::Text, Some(text.clone()), None)
    } else if let Some(text) = &body.extended_text {
        (MessageType::Text, Some(text.clone()), None)
    } else if body.image_caption.is_some() || (body.media_url.is_some() && is_image_mime(&body.media_mime_type)) {
        (
            MessageType::Image,
            body.image_caption.clone(),
            Some(media_from_body(body, MediaType::Image)),
        )
    } else if body.video_caption.is_some() || is_video_mime(&body.media_mime_type) {
        (
            MessageType::Video,
            body.video_caption.clone(),
            Some(media_from_body(body, MediaType::Video)),
        )
    } else if body.audio {
        (MessageType::Audio, None, Some(media_from_body(body, MediaType::Audio)))
    } else if let Some(title) = &body.document_title {
        (
            MessageType::Document,
            Some(title.clone()),
            Some(media_from_body(body, MediaType::Document)),
        )
    } else {
        (MessageType::Text, Some("[Unsupported message type]".to_string()), None)
    };

    Message {
        conversation_external_id: info.conversation_external_id.clone(),
        external_message_id: info.message_external_id.clone(),
        sender_external_id: info
            .sender_external_id
            .clone()
            .unwrap_or_else(|| info.conversation_external_id.clone()),
        message_type,
        content,
        delivery_status: DeliveryStatus::Sent,
        timestamp: secs_to_datetime(info.timestamp_secs).unwrap_or_else(chrono::Utc::now),
        reply_to_external_id: info.quoted_message_external_id.clone(),
        is_deleted: false,
        platform_metadata: HashMap::new(),
        media,
    }
}

fn is_image_mime(mime: &Option<String>) -> bool {
    mime.as_deref().is_some_and(|m| m.starts_with("image/"))
}

fn is_video_mime(mime: &Option<String>) -> bool {
    mime.as_deref().is_some_and(|m| m.starts_with("video/"))
}

fn media_from_body(body: &UpstreamMessageBody, media_type: MediaType) -> MessageMedia {
    MessageMedia {
        media_type,
        url: body.media_url.clone(),
        mime_type: body.media_mime_type.clone(),
        file_size: body.media_file_size,
        width: body.media_width,
        height: body.media_height,
        download_status: if body.media_url.is_some() {
            DownloadStatus::Pending
        } else {
            DownloadStatus::Failed
        },
    }
}

fn contact_from_upstream(contact: &UpstreamContact) -> Contact {
    Contact {
        user_integration_id: 0,
        external_contact_id: contact.external_id.clone(),
        display_name: contact
            .display_name
            .clone()
            .or_else(|| contact.push_name.clone())
            .unwrap_or_default(),
        phone_number: contact.phone_number.clone(),
        avatar_url: None,
        is_blocked: false,
        is_favorite: false,
    }
}

fn group_info_to_action(info: &UpstreamGroupInfo) -> NormalizedAction {
    let participants = info
        .participants
        .iter()
        .map(|p| ConversationParticipant {
            conversation_external_id: info.conversation_external_id.clone(),
            external_user_id: p.external_user_id.clone(),
            display_name: None,
            role: if p.is_super_admin {
                ParticipantRole::Owner
            } else if p.is_admin {
                ParticipantRole::Admin
            } else {
                ParticipantRole::Member
            },
            is_active: true,
            joined_at: None,
        })
        .collect();
    NormalizedAction::UpsertParticipants {
        conversation_external_id: info.conversation_external_id.clone(),
        participants,
    }
}

/// Splits a vector into batches no larger than `max_len`, tagging the last
/// one so callers can set `is_final_batch` without recomputing the length.
pub fn chunk_with_final_marker<T>(items: Vec<T>, max_len: usize) -> Vec<(Vec<T>, bool)> {
    if items.is_empty() {
        return vec![(Vec::new(), true)];
    }
    let total = items.len();
    let mut out = Vec::new();
    let mut iter = items.into_iter().peekable();
    let mut taken = 0;
    while iter.peek().is_some() {
        let chunk: Vec<T> = iter.by_ref().take(max_len).collect();
        taken += chunk.len();
        out.push((chunk, taken >= total));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream_event::UpstreamGroupParticipant;

    fn msg_info(conv: &str, id: &str, quoted: Option<&str>) -> UpstreamMessageInfo {
        UpstreamMessageInfo {
            conversation_external_id: conv.to_string(),
            message_external_id: id.to_string(),
            sender_external_id: Some("user-1".to_string()),
            quoted_message_external_id: quoted.map(|s| s.to_string()),
            timestamp_secs: 1_700_000_000,
        }
    }

    fn empty_body() -> UpstreamMessageBody {
        UpstreamMessageBody {
            conversation_text: None,
            extended_text: None,
            image_caption: None,
            video_caption: None,
            audio: false,
            document_title: None,
            media_url: None,
            media_mime_type: None,
            media_file_size: None,
            media_width: None,
            media_height: None,
        }
    }

    #[test]
    fn text_message_priority_wins_over_unset_fields() {
        let body = UpstreamMessageBody {
            conversation_text: Some("hi".to_string()),
            ..empty_body()
        };
        let msg = message_from_upstream(&msg_info("c1", "m1", None), &body);
        assert!(matches!(msg.message_type, MessageType::Text));
        assert_eq!(msg.content.as_deref(), Some("hi"));
    }

    #[test]
    fn reply_reference_is_soft_and_never_resolved_here() {
        let msg = message_from_upstream(&msg_info("c1", "m2", Some("m1")), &empty_body());
        assert_eq!(msg.reply_to_external_id.as_deref(), Some("m1"));
    }

    #[test]
    fn unsupported_body_falls_back_to_placeholder_text() {
        let msg = message_from_upstream(&msg_info("c1", "m3", None), &empty_body());
        assert_eq!(msg.content.as_deref(), Some("[Unsupported message type]"));
    }

    #[test]
    fn image_caption_without_mime_still_classified_as_image() {
        let body = UpstreamMessageBody {
            image_caption: Some("look at this".to_string()),
            ..empty_body()
        };
        let msg = message_from_upstream(&msg_info("c1", "m4", None), &body);
        assert!(matches!(msg.message_type, MessageType::Image));
        assert!(msg.media.is_some());
    }

    #[test]
    fn history_bundle_produces_conversation_and_message_batches() {
        let event = UpstreamEvent::HistoryBundle {
            conversations: vec![UpstreamConversation {
                external_id: "c1".to_string(),
                name: Some("Team".to_string()),
                avatar_url: None,
                participant_external_ids: vec!["u1".to_string(), "u2".to_string()],
                is_broadcast: false,
                is_channel: false,
            }],
            messages_by_conversation: vec![(
                "c1".to_string(),
                vec![(msg_info("c1", "m1", None), empty_body())],
            )],
        };
        let actions = normalize(event);
        assert!(actions
            .iter()
            .any(|a| matches!(a, NormalizedAction::UpsertConversations(v) if v.len() == 1)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, NormalizedAction::UpsertParticipants { participants, .. } if participants.len() == 2)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, NormalizedAction::UpsertMessages { messages, .. } if messages.len() == 1)));
    }

    #[test]
    fn unrecognized_event_yields_no_actions() {
        let event = UpstreamEvent::Unrecognized {
            kind: "mystery".to_string(),
            raw: HashMap::new(),
        };
        assert!(normalize(event).is_empty());
    }

    #[test]
    fn group_info_maps_super_admin_to_owner_role() {
        let info = UpstreamGroupInfo {
            conversation_external_id: "g1".to_string(),
            name: None,
            participants: vec![UpstreamGroupParticipant {
                external_user_id: "u1".to_string(),
                is_admin: true,
                is_super_admin: true,
            }],
        };
        let action = group_info_to_action(&info);
        match action {
            NormalizedAction::UpsertParticipants { participants, .. } => {
                assert!(matches!(participants[0].role, ParticipantRole::Owner));
            }
            _ => panic!("expected UpsertParticipants"),
        }
    }

    #[test]
    fn chunking_tags_only_the_last_chunk_as_final() {
        let items: Vec<i32> = (0..120).collect();
        let batches = chunk_with_final_marker(items, 50);
        assert_eq!(batches.len(), 3);
        assert!(!batches[0].1);
        assert!(!batches[1].1);
        assert!(batches[2].1);
        assert_eq!(batches[2].0.len(), 20);
    }

    #[test]
    fn chunking_empty_input_yields_single_final_empty_batch() {
        let batches = chunk_with_final_marker(Vec::<i32>::new(), 50);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].1);
        assert!(batches[0].0.is_empty());
    }
}
