use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::{queries, DbPool};

use super::dispatch::OutboxDispatcher;

/// Exponential backoff, base 5s doubling per retry, capped at 300s:
/// 5, 10, 20, 40, 80, 160, 300, 300, ...
fn backoff_delay(retry_count: i32) -> Duration {
    let base = 5u64;
    let delay = base.saturating_mul(2u64.saturating_pow(retry_count.max(0) as u32));
    Duration::from_secs(delay.min(300))
}

pub async fn run_worker(
    pool: DbPool,
    dispatcher: OutboxDispatcher,
    batch_size: i64,
    max_retries: i32,
    tick_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(?tick_interval, "starting outbox retry worker");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = process_pending_batch(&pool, &dispatcher, batch_size, max_retries).await {
                    tracing::error!(error = %err, "outbox batch processing failed");
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("outbox worker shutting down");
                break;
            }
        }
    }
}

async fn process_pending_batch(
    pool: &DbPool,
    dispatcher: &OutboxDispatcher,
    batch_size: i64,
    max_retries: i32,
) -> anyhow::Result<()> {
    let batch = queries::fetch_pending_outbox_batch(pool, batch_size).await?;
    if batch.is_empty() {
        return Ok(());
    }

    metrics::gauge!("outbox_queue_depth", batch.len() as f64);

    for item in batch {
        if let Err(err) = process_item(pool, dispatcher, &item, max_retries).await {
            tracing::warn!(client_msg_uuid = %item.client_msg_uuid, error = %err, "outbox item processing failed");
        }
    }

    Ok(())
}

async fn process_item(
    pool: &DbPool,
    dispatcher: &OutboxDispatcher,
    item: &crate::db::models::OutboxRow,
    max_retries: i32,
) -> anyhow::Result<()> {
    queries::mark_outbox_sending(pool, item.client_msg_uuid).await?;

    match dispatcher
        .dispatch(item.account_id, item.client_msg_uuid, &item.convo_id, &item.body)
        .await
    {
        Ok(upstream_message_id) => {
            queries::mark_outbox_sent(
                pool,
                item.client_msg_uuid,
                item.account_id,
                &item.convo_id,
                &upstream_message_id,
            )
            .await?;
            metrics::counter!("outbox_dispatch_total", 1, "outcome" => "sent");
        }
        Err(err) if err.is_retryable() && item.can_retry(max_retries) => {
            let delay = backoff_delay(item.retry_count);
            queries::schedule_outbox_retry(
                pool,
                item.client_msg_uuid,
                &err.to_string(),
                Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default(),
            )
            .await?;
            metrics::counter!("outbox_dispatch_total", 1, "outcome" => "retry");
        }
        Err(err) => {
            queries::mark_outbox_failed(pool, item.client_msg_uuid, &err.to_string()).await?;
            metrics::counter!("outbox_dispatch_total", 1, "outcome" => "failed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps_at_300s() {
        assert_eq!(backoff_delay(0), Duration::from_secs(5));
        assert_eq!(backoff_delay(1), Duration::from_secs(10));
        assert_eq!(backoff_delay(2), Duration::from_secs(20));
        assert_eq!(backoff_delay(3), Duration::from_secs(40));
        assert_eq!(backoff_delay(4), Duration::from_secs(80));
        assert_eq!(backoff_delay(5), Duration::from_secs(160));
        assert_eq!(backoff_delay(6), Duration::from_secs(300));
        assert_eq!(backoff_delay(10), Duration::from_secs(300));
    }
}
