use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub http_port: u16,
    pub grpc_port: u16,
    pub outbox_worker_interval: Duration,
    pub outbox_batch_size: i64,
    pub outbox_max_retries: i32,
    pub enable_metrics: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            http_port: env_u16("HTTP_PORT", 8080),
            grpc_port: env_u16("GRPC_PORT", 8081),
            outbox_worker_interval: Duration::from_secs(env_u64("OUTBOX_WORKER_INTERVAL", 5)),
            outbox_batch_size: env_u64("OUTBOX_BATCH_SIZE", 50) as i64,
            outbox_max_retries: 7,
            enable_metrics: std::env::var("ENABLE_METRICS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
