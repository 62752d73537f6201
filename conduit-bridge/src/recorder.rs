//! Appends a JSON line per upstream signal when `RECORDING_MODE=record`, so
//! a session's wire traffic can be replayed later against test fixtures.
//! One file per session, named after its key, under `session_store_path`.

use std::path::PathBuf;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::config::RecordingMode;
use crate::session::types::SessionKey;
use crate::upstream::UpstreamSignal;

#[derive(Clone)]
pub struct SessionRecorder {
    path: Option<PathBuf>,
}

impl SessionRecorder {
    pub fn new(mode: RecordingMode, store_path: &str, key: &SessionKey) -> Self {
        let path = match mode {
            RecordingMode::Record => Some(PathBuf::from(store_path).join(format!("{}.jsonl", sanitize(&key.to_string())))),
            RecordingMode::Off => None,
        };
        Self { path }
    }

    pub async fn record(&self, signal: &UpstreamSignal) {
        let Some(path) = &self.path else { return };

        let line = match serde_json::to_string(signal) {
            Ok(l) => l,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize upstream signal for recording");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(error = %err, path = %parent.display(), "failed to create session recording directory");
                return;
            }
        }

        match OpenOptions::new().create(true).append(true).open(path).await {
            Ok(mut file) => {
                if let Err(err) = file.write_all(line.as_bytes()).await {
                    tracing::warn!(error = %err, "failed to append session recording");
                    return;
                }
                let _ = file.write_all(b"\n").await;
            }
            Err(err) => tracing::warn!(error = %err, path = %path.display(), "failed to open session recording file"),
        }
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_mode_has_no_path() {
        let key = SessionKey {
            user_id: uuid::Uuid::new_v4(),
            integration_type: conduit_common::model::IntegrationType::Whatsapp,
        };
        let recorder = SessionRecorder::new(RecordingMode::Off, "./store", &key);
        assert!(recorder.path.is_none());
    }

    #[test]
    fn record_mode_derives_path_from_key() {
        let key = SessionKey {
            user_id: uuid::Uuid::new_v4(),
            integration_type: conduit_common::model::IntegrationType::Whatsapp,
        };
        let recorder = SessionRecorder::new(RecordingMode::Record, "./store", &key);
        assert!(recorder.path.is_some());
    }

    #[test]
    fn sanitize_replaces_path_hostile_characters() {
        assert_eq!(sanitize("a/b:c"), "a_b_c");
    }
}
