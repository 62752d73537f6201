pub mod error;
pub mod model;
pub mod normalizer;
pub mod upstream_event;

pub use error::{CoreError, ErrorCode, NormalizeError};
pub use upstream_event::secs_to_datetime;

/// Upstream timestamps are seconds since epoch with `0` meaning "unset";
/// callers that need a concrete instant fall back to now rather than
/// persisting a zero-value date.
pub fn upstream_event_timestamp(secs: i64) -> chrono::DateTime<chrono::Utc> {
    secs_to_datetime(secs).unwrap_or_else(chrono::Utc::now)
}
