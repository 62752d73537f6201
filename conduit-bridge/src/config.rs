#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub control_port: u16,
    pub core_ingest_addr: String,
    pub session_store_path: String,
    pub recording_mode: RecordingMode,
    pub enable_metrics: bool,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    Off,
    Record,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            control_port: env_u16("BRIDGE_CONTROL_PORT", 9090),
            core_ingest_addr: std::env::var("CORE_GRPC_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8081".to_string()),
            session_store_path: std::env::var("SESSION_STORE_PATH").unwrap_or_else(|_| "./session-store".to_string()),
            recording_mode: match std::env::var("RECORDING_MODE").as_deref() {
                Ok("record") => RecordingMode::Record,
                _ => RecordingMode::Off,
            },
            enable_metrics: std::env::var("ENABLE_METRICS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            metrics_port: env_u16("BRIDGE_METRICS_PORT", 9091),
        }
    }
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
