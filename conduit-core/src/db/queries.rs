use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use conduit_common::model as m;
use sqlx::types::Json;
use uuid::Uuid;

use super::models::{
    conversation_type_str, delivery_status_str, message_type_str, ContactRow, ConversationRow,
    EventRow, MessageRow, OutboxRow, UpsertedMessageRow, UserIntegrationRow,
};
use super::pool::DbPool;

// =============================================================================
// User Integration Operations
// =============================================================================

pub async fn get_or_create_user_integration(
    pool: &DbPool,
    user_id: Uuid,
    integration_type: &str,
    external_id: &str,
) -> Result<UserIntegrationRow> {
    let row = sqlx::query_as::<_, UserIntegrationRow>(
        r#"
        INSERT INTO user_integrations (user_id, integration_type, external_id, status)
        VALUES ($1, $2, $3, 'connecting')
        ON CONFLICT (user_id, integration_type)
        DO UPDATE SET external_id = $3, updated_at = now()
        RETURNING id, user_id, integration_type, external_id, status, display_name,
                  avatar_url, metadata, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(integration_type)
    .bind(external_id)
    .fetch_one(pool)
    .await
    .context("failed to upsert user integration")?;

    Ok(row)
}

pub async fn get_user_integration(pool: &DbPool, id: i32) -> Result<Option<UserIntegrationRow>> {
    let row = sqlx::query_as::<_, UserIntegrationRow>(
        r#"
        SELECT id, user_id, integration_type, external_id, status, display_name,
               avatar_url, metadata, created_at, updated_at
        FROM user_integrations WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch user integration")?;

    Ok(row)
}

pub async fn update_connection_status(
    pool: &DbPool,
    user_integration_id: i32,
    status: m::ConnectionStatus,
    metadata: &HashMap<String, String>,
) -> Result<()> {
    let status_str = match status {
        m::ConnectionStatus::Connected => "connected",
        m::ConnectionStatus::Connecting => "connecting",
        m::ConnectionStatus::Disconnected => "disconnected",
        m::ConnectionStatus::Error => "error",
        m::ConnectionStatus::QrGenerated => "qr_generated",
        m::ConnectionStatus::Paired => "paired",
    };

    sqlx::query(
        r#"
        UPDATE user_integrations
        SET status = $1, metadata = metadata || $2::jsonb, updated_at = $3
        WHERE id = $4
        "#,
    )
    .bind(status_str)
    .bind(Json(metadata))
    .bind(Utc::now())
    .bind(user_integration_id)
    .execute(pool)
    .await
    .context("failed to update connection status")?;

    Ok(())
}

// =============================================================================
// Conversation Operations
// =============================================================================

pub async fn upsert_conversation(
    pool: &DbPool,
    user_integration_id: i32,
    conv: &m::Conversation,
) -> Result<ConversationRow> {
    let row = sqlx::query_as::<_, ConversationRow>(
        r#"
        INSERT INTO conversations (
            user_integration_id, external_conversation_id, conversation_type,
            name, avatar_url, is_archived, is_pinned, is_muted, mute_until,
            platform_metadata, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
        ON CONFLICT (user_integration_id, external_conversation_id)
        DO UPDATE SET
            conversation_type = $3,
            name = COALESCE($4, conversations.name),
            avatar_url = COALESCE($5, conversations.avatar_url),
            is_archived = $6,
            is_pinned = $7,
            is_muted = $8,
            mute_until = $9,
            platform_metadata = conversations.platform_metadata || $10::jsonb,
            seq = nextval('conversations_seq'),
            updated_at = now()
        RETURNING id, seq, user_integration_id, external_conversation_id, conversation_type,
                  name, avatar_url, unread_count, unread_mention_count, total_message_count,
                  last_message_at, is_archived, is_pinned, is_muted, mute_until,
                  platform_metadata, created_at, updated_at
        "#,
    )
    .bind(user_integration_id)
    .bind(&conv.external_conversation_id)
    .bind(conversation_type_str(conv.conversation_type))
    .bind(&conv.name)
    .bind(&conv.avatar_url)
    .bind(conv.is_archived)
    .bind(conv.is_pinned)
    .bind(conv.is_muted)
    .bind(conv.mute_until)
    .bind(Json(&conv.platform_metadata))
    .fetch_one(pool)
    .await
    .context("failed to upsert conversation")?;

    Ok(row)
}

pub async fn update_conversation_state(
    pool: &DbPool,
    user_integration_id: i32,
    external_conversation_id: &str,
    is_archived: bool,
    is_pinned: bool,
    is_muted: bool,
    mute_until: Option<chrono::DateTime<Utc>>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET is_archived = $1, is_pinned = $2, is_muted = $3, mute_until = $4,
            seq = nextval('conversations_seq'), updated_at = now()
        WHERE user_integration_id = $5 AND external_conversation_id = $6
        "#,
    )
    .bind(is_archived)
    .bind(is_pinned)
    .bind(is_muted)
    .bind(mute_until)
    .bind(user_integration_id)
    .bind(external_conversation_id)
    .execute(pool)
    .await
    .context("failed to update conversation state")?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_conversation_id(
    pool: &DbPool,
    user_integration_id: i32,
    external_conversation_id: &str,
) -> Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM conversations WHERE user_integration_id = $1 AND external_conversation_id = $2",
    )
    .bind(user_integration_id)
    .bind(external_conversation_id)
    .fetch_optional(pool)
    .await
    .context("failed to look up conversation id")?;

    Ok(id)
}

pub struct Page<T> {
    pub items: Vec<T>,
    pub latest_seq: i64,
    pub has_more: bool,
    pub total_count: i64,
}

pub async fn list_conversations_since(
    pool: &DbPool,
    user_integration_id: i32,
    since_seq: i64,
    limit: i64,
) -> Result<Page<ConversationRow>> {
    let items = sqlx::query_as::<_, ConversationRow>(
        r#"
        SELECT id, seq, user_integration_id, external_conversation_id, conversation_type,
               name, avatar_url, unread_count, unread_mention_count, total_message_count,
               last_message_at, is_archived, is_pinned, is_muted, mute_until,
               platform_metadata, created_at, updated_at
        FROM conversations
        WHERE user_integration_id = $1 AND seq > $2
        ORDER BY seq ASC
        LIMIT $3
        "#,
    )
    .bind(user_integration_id)
    .bind(since_seq)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list conversations")?;

    let total_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM conversations WHERE user_integration_id = $1",
    )
    .bind(user_integration_id)
    .fetch_one(pool)
    .await
    .context("failed to count conversations")?;

    let has_more = items.len() as i64 == limit;
    let latest_seq = items.last().map(|r| r.seq).unwrap_or(since_seq);

    Ok(Page {
        items,
        latest_seq,
        has_more,
        total_count,
    })
}

// =============================================================================
// Participant Operations
// =============================================================================

pub async fn upsert_participant(
    pool: &DbPool,
    conversation_id: Uuid,
    participant: &m::ConversationParticipant,
) -> Result<()> {
    let role_str = match participant.role {
        m::ParticipantRole::Member => "member",
        m::ParticipantRole::Admin => "admin",
        m::ParticipantRole::Owner => "owner",
        m::ParticipantRole::Moderator => "moderator",
    };

    sqlx::query(
        r#"
        INSERT INTO conversation_participants
            (conversation_id, external_user_id, display_name, role, is_active, joined_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (conversation_id, external_user_id)
        DO UPDATE SET
            display_name = COALESCE($3, conversation_participants.display_name),
            role = $4,
            is_active = $5
        "#,
    )
    .bind(conversation_id)
    .bind(&participant.external_user_id)
    .bind(&participant.display_name)
    .bind(role_str)
    .bind(participant.is_active)
    .bind(participant.joined_at)
    .execute(pool)
    .await
    .context("failed to upsert participant")?;

    Ok(())
}

// =============================================================================
// Message Operations
// =============================================================================

pub async fn upsert_message(
    pool: &DbPool,
    conversation_id: Uuid,
    msg: &m::Message,
) -> Result<MessageRow> {
    // reply_to_external_id is resolved against whatever has already landed;
    // if the target isn't there yet reply_to_message_id stays null and is
    // never back-filled later (S3).
    let reply_to_message_id = if let Some(ext) = &msg.reply_to_external_id {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM messages WHERE conversation_id = $1 AND external_message_id = $2",
        )
        .bind(conversation_id)
        .bind(ext)
        .fetch_optional(pool)
        .await
        .context("failed to resolve reply target")?
    } else {
        None
    };

    let upserted = sqlx::query_as::<_, UpsertedMessageRow>(
        r#"
        INSERT INTO messages (
            conversation_id, external_message_id, sender_external_id, message_type,
            content, delivery_status, timestamp, reply_to_external_id,
            reply_to_message_id, platform_metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (conversation_id, external_message_id)
        DO UPDATE SET
            delivery_status = $6,
            platform_metadata = messages.platform_metadata || $10::jsonb,
            seq = nextval('messages_seq')
        RETURNING id, seq, conversation_id, external_message_id, sender_external_id,
                  message_type, content, delivery_status, timestamp, reply_to_external_id,
                  reply_to_message_id, is_deleted, deleted_at, platform_metadata, created_at,
                  (xmax = 0) AS inserted
        "#,
    )
    .bind(conversation_id)
    .bind(&msg.external_message_id)
    .bind(&msg.sender_external_id)
    .bind(message_type_str(msg.message_type))
    .bind(&msg.content)
    .bind(delivery_status_str(msg.delivery_status))
    .bind(msg.timestamp)
    .bind(&msg.reply_to_external_id)
    .bind(reply_to_message_id)
    .bind(Json(&msg.platform_metadata))
    .fetch_one(pool)
    .await
    .context("failed to upsert message")?;

    let row = upserted.row;

    if let Some(media) = &msg.media {
        sqlx::query(
            r#"
            INSERT INTO message_media (message_id, media_type, url, mime_type, file_size, width, height, download_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.id)
        .bind(match media.media_type {
            m::MediaType::Image => "image",
            m::MediaType::Video => "video",
            m::MediaType::Audio => "audio",
            m::MediaType::Document => "document",
            m::MediaType::Sticker => "sticker",
        })
        .bind(&media.url)
        .bind(&media.mime_type)
        .bind(media.file_size)
        .bind(media.width)
        .bind(media.height)
        .bind(match media.download_status {
            m::DownloadStatus::Pending => "pending",
            m::DownloadStatus::Downloading => "downloading",
            m::DownloadStatus::Completed => "completed",
            m::DownloadStatus::Failed => "failed",
        })
        .execute(pool)
        .await
        .context("failed to insert message media")?;
    }

    // Only a fresh insert grows the conversation; a duplicate/retry replay
    // of the same external_message_id must leave counters untouched (S2).
    if upserted.inserted {
        sqlx::query(
            r#"
            UPDATE conversations
            SET total_message_count = total_message_count + 1,
                last_message_at = GREATEST(last_message_at, $1)
            WHERE id = $2
            "#,
        )
        .bind(msg.timestamp)
        .bind(conversation_id)
        .execute(pool)
        .await
        .context("failed to bump conversation counters")?;
    }

    Ok(row)
}

pub async fn update_delivery_status(
    pool: &DbPool,
    conversation_id: Uuid,
    external_message_ids: &[String],
    status: m::DeliveryStatus,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET delivery_status = $1, seq = nextval('messages_seq')
        WHERE conversation_id = $2 AND external_message_id = ANY($3)
        "#,
    )
    .bind(delivery_status_str(status))
    .bind(conversation_id)
    .bind(external_message_ids)
    .execute(pool)
    .await
    .context("failed to update delivery status")?;

    Ok(result.rows_affected())
}

pub async fn list_messages_since(
    pool: &DbPool,
    conversation_id: Uuid,
    since_seq: i64,
    limit: i64,
) -> Result<Page<MessageRow>> {
    let items = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, seq, conversation_id, external_message_id, sender_external_id,
               message_type, content, delivery_status, timestamp, reply_to_external_id,
               reply_to_message_id, is_deleted, deleted_at, platform_metadata, created_at
        FROM messages
        WHERE conversation_id = $1 AND seq > $2
        ORDER BY seq ASC
        LIMIT $3
        "#,
    )
    .bind(conversation_id)
    .bind(since_seq)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list messages")?;

    let total_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(pool)
            .await
            .context("failed to count messages")?;

    let has_more = items.len() as i64 == limit;
    let latest_seq = items.last().map(|r| r.seq).unwrap_or(since_seq);

    Ok(Page {
        items,
        latest_seq,
        has_more,
        total_count,
    })
}

/// Sync API reads messages across an entire integration (not scoped to one
/// conversation), unlike `list_messages_since` which the ingest side uses
/// per-conversation.
pub async fn list_messages_for_integration_since(
    pool: &DbPool,
    user_integration_id: i32,
    since_seq: i64,
    limit: i64,
) -> Result<Page<MessageRow>> {
    let items = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT m.id, m.seq, m.conversation_id, m.external_message_id, m.sender_external_id,
               m.message_type, m.content, m.delivery_status, m.timestamp, m.reply_to_external_id,
               m.reply_to_message_id, m.is_deleted, m.deleted_at, m.platform_metadata, m.created_at
        FROM messages m
        INNER JOIN conversations c ON c.id = m.conversation_id
        WHERE c.user_integration_id = $1 AND m.seq > $2
        ORDER BY m.seq ASC
        LIMIT $3
        "#,
    )
    .bind(user_integration_id)
    .bind(since_seq)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list messages for integration")?;

    let total_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM messages m
        INNER JOIN conversations c ON c.id = m.conversation_id
        WHERE c.user_integration_id = $1
        "#,
    )
    .bind(user_integration_id)
    .fetch_one(pool)
    .await
    .context("failed to count messages for integration")?;

    let has_more = items.len() as i64 == limit;
    let latest_seq = items.last().map(|r| r.seq).unwrap_or(since_seq);

    Ok(Page {
        items,
        latest_seq,
        has_more,
        total_count,
    })
}

// =============================================================================
// Contact Operations
// =============================================================================

pub async fn upsert_contact(
    pool: &DbPool,
    user_integration_id: i32,
    contact: &m::Contact,
) -> Result<ContactRow> {
    let row = sqlx::query_as::<_, ContactRow>(
        r#"
        INSERT INTO contacts (user_integration_id, external_contact_id, display_name, phone_number, avatar_url, is_blocked, is_favorite, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        ON CONFLICT (user_integration_id, external_contact_id)
        DO UPDATE SET
            display_name = CASE WHEN $3 = '' THEN contacts.display_name ELSE $3 END,
            phone_number = COALESCE($4, contacts.phone_number),
            avatar_url = COALESCE($5, contacts.avatar_url),
            is_blocked = $6,
            is_favorite = $7,
            seq = nextval('contacts_seq'),
            updated_at = now()
        RETURNING id, seq, user_integration_id, external_contact_id, display_name, phone_number,
                  avatar_url, is_blocked, is_favorite, created_at, updated_at
        "#,
    )
    .bind(user_integration_id)
    .bind(&contact.external_contact_id)
    .bind(&contact.display_name)
    .bind(&contact.phone_number)
    .bind(&contact.avatar_url)
    .bind(contact.is_blocked)
    .bind(contact.is_favorite)
    .fetch_one(pool)
    .await
    .context("failed to upsert contact")?;

    Ok(row)
}

pub async fn list_contacts_since(
    pool: &DbPool,
    user_integration_id: i32,
    since_seq: i64,
    limit: i64,
) -> Result<Page<ContactRow>> {
    let items = sqlx::query_as::<_, ContactRow>(
        r#"
        SELECT id, seq, user_integration_id, external_contact_id, display_name, phone_number,
               avatar_url, is_blocked, is_favorite, created_at, updated_at
        FROM contacts
        WHERE user_integration_id = $1 AND seq > $2
        ORDER BY seq ASC
        LIMIT $3
        "#,
    )
    .bind(user_integration_id)
    .bind(since_seq)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list contacts")?;

    let total_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts WHERE user_integration_id = $1")
            .bind(user_integration_id)
            .fetch_one(pool)
            .await
            .context("failed to count contacts")?;

    let has_more = items.len() as i64 == limit;
    let latest_seq = items.last().map(|r| r.seq).unwrap_or(since_seq);

    Ok(Page {
        items,
        latest_seq,
        has_more,
        total_count,
    })
}

// =============================================================================
// Outbox & Event Operations
// =============================================================================

/// Creates the paired Outbox row and `msg_out_pending` Event row in a single
/// transaction, both keyed by `client_msg_uuid`. Retried calls with the same
/// uuid are idempotent no-ops: the `ON CONFLICT DO NOTHING` on `outbox`
/// combined with re-reading the row covers the "already enqueued" case.
pub async fn enqueue_outbox(
    pool: &DbPool,
    client_msg_uuid: Uuid,
    account_id: i32,
    convo_id: &str,
    body: &str,
) -> Result<OutboxRow> {
    let mut tx = pool.begin().await.context("failed to start transaction")?;

    let existing = sqlx::query_as::<_, OutboxRow>(
        r#"
        SELECT client_msg_uuid, account_id, convo_id, body, server_msg_id, status,
               last_error, retry_count, next_retry_at, created_at
        FROM outbox WHERE client_msg_uuid = $1
        "#,
    )
    .bind(client_msg_uuid)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to check existing outbox row")?;

    if let Some(row) = existing {
        tx.commit().await.context("failed to commit idempotent outbox read")?;
        return Ok(row);
    }

    let row = sqlx::query_as::<_, OutboxRow>(
        r#"
        INSERT INTO outbox (client_msg_uuid, account_id, convo_id, body, status)
        VALUES ($1, $2, $3, $4, 'queued')
        RETURNING client_msg_uuid, account_id, convo_id, body, server_msg_id, status,
                  last_error, retry_count, next_retry_at, created_at
        "#,
    )
    .bind(client_msg_uuid)
    .bind(account_id)
    .bind(convo_id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert outbox row")?;

    sqlx::query(
        r#"
        INSERT INTO events (id, account_id, convo_id, event_type, payload)
        VALUES ($1, $2, $3, 'msg_out_pending', $4::jsonb)
        "#,
    )
    .bind(client_msg_uuid)
    .bind(account_id)
    .bind(convo_id)
    .bind(Json(serde_json::json!({ "body": body })))
    .execute(&mut *tx)
    .await
    .context("failed to insert msg_out_pending event")?;

    tx.commit().await.context("failed to commit outbox enqueue")?;

    Ok(row)
}

pub async fn fetch_pending_outbox_batch(pool: &DbPool, limit: i64) -> Result<Vec<OutboxRow>> {
    let rows = sqlx::query_as::<_, OutboxRow>(
        r#"
        SELECT client_msg_uuid, account_id, convo_id, body, server_msg_id, status,
               last_error, retry_count, next_retry_at, created_at
        FROM outbox
        WHERE status IN ('queued', 'retry') AND next_retry_at <= now()
        ORDER BY created_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch pending outbox batch")?;

    Ok(rows)
}

pub async fn mark_outbox_sending(pool: &DbPool, client_msg_uuid: Uuid) -> Result<()> {
    sqlx::query("UPDATE outbox SET status = 'sending' WHERE client_msg_uuid = $1")
        .bind(client_msg_uuid)
        .execute(pool)
        .await
        .context("failed to mark outbox row sending")?;
    Ok(())
}

pub async fn mark_outbox_sent(
    pool: &DbPool,
    client_msg_uuid: Uuid,
    account_id: i32,
    convo_id: &str,
    upstream_message_id: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("failed to start transaction")?;

    sqlx::query("UPDATE outbox SET status = 'sent', server_msg_id = $1 WHERE client_msg_uuid = $2")
        .bind(upstream_message_id)
        .bind(client_msg_uuid)
        .execute(&mut *tx)
        .await
        .context("failed to mark outbox row sent")?;

    sqlx::query(
        r#"
        INSERT INTO events (id, account_id, convo_id, event_type, payload, wa_message_id)
        VALUES (gen_random_uuid(), $1, $2, 'msg_out_sent', $3::jsonb, $4)
        "#,
    )
    .bind(account_id)
    .bind(convo_id)
    .bind(Json(serde_json::json!({ "client_msg_uuid": client_msg_uuid })))
    .bind(upstream_message_id)
    .execute(&mut *tx)
    .await
    .context("failed to insert msg_out_sent event")?;

    tx.commit().await.context("failed to commit outbox sent")?;
    Ok(())
}

pub async fn mark_outbox_failed(pool: &DbPool, client_msg_uuid: Uuid, error: &str) -> Result<()> {
    sqlx::query("UPDATE outbox SET status = 'failed', last_error = $1 WHERE client_msg_uuid = $2")
        .bind(error)
        .bind(client_msg_uuid)
        .execute(pool)
        .await
        .context("failed to mark outbox row failed")?;
    Ok(())
}

pub async fn schedule_outbox_retry(
    pool: &DbPool,
    client_msg_uuid: Uuid,
    error: &str,
    next_retry_at: chrono::DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE outbox
        SET status = 'retry', last_error = $1, retry_count = retry_count + 1, next_retry_at = $2
        WHERE client_msg_uuid = $3
        "#,
    )
    .bind(error)
    .bind(next_retry_at)
    .bind(client_msg_uuid)
    .execute(pool)
    .await
    .context("failed to schedule outbox retry")?;
    Ok(())
}

pub async fn get_outbox(pool: &DbPool, client_msg_uuid: Uuid) -> Result<Option<OutboxRow>> {
    let row = sqlx::query_as::<_, OutboxRow>(
        r#"
        SELECT client_msg_uuid, account_id, convo_id, body, server_msg_id, status,
               last_error, retry_count, next_retry_at, created_at
        FROM outbox WHERE client_msg_uuid = $1
        "#,
    )
    .bind(client_msg_uuid)
    .fetch_optional(pool)
    .await
    .context("failed to fetch outbox row")?;

    Ok(row)
}

#[allow(dead_code)]
pub async fn recent_events(pool: &DbPool, account_id: i32, limit: i64) -> Result<Vec<EventRow>> {
    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT seq, id, account_id, convo_id, event_type, payload, wa_message_id, created_at
        FROM events
        WHERE account_id = $1
        ORDER BY seq DESC
        LIMIT $2
        "#,
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch recent events")?;

    Ok(rows)
}
