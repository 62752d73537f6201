//! Pairing timing constants and the artifact shape returned by `Connect`.
//! Kept separate from `actor.rs` because both the supervisor (first-artifact
//! timeout) and the session task (refresh budget) need them.

use std::time::Duration;

/// Hard timeout on the first QR artifact after `Connect`.
pub const FIRST_ARTIFACT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-refresh timeout once pairing is underway; reset on each new artifact.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(60);

/// Refreshes allowed before pairing is abandoned as `qr_timeout`.
pub const MAX_REFRESHES: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_timeout_exceeds_first_artifact_timeout() {
        assert!(REFRESH_TIMEOUT > FIRST_ARTIFACT_TIMEOUT);
    }
}
