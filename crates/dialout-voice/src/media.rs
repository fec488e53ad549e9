//! Media storage for synthesized and recorded audio.
//!
//! The store maps a flat object key to stored bytes and a publicly
//! fetchable URL the telephony provider can `<Play>`. The filesystem
//! implementation backs the `/api/calls/audio/{filename}` endpoint; an
//! object-store deployment only needs another `MediaStore` implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::VoiceError;

/// Maximum recording size accepted for archiving (10 MiB).
const MAX_RECORDING_BYTES: usize = 10 * 1024 * 1024;

/// Bounded timeout for downloading a recording from the provider.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Object storage for call audio.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores bytes under `key` and returns the public URL they are served
    /// from. Keys are flat filenames (no path separators).
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, VoiceError>;
}

/// Filesystem-backed media store serving through the HTTP audio endpoint.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsMediaStore {
    /// `root` is the directory audio files land in; `public_base_url` is the
    /// externally reachable server URL (e.g. `https://calls.example.com`).
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The directory audio files are stored in.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, VoiceError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(key), bytes).await?;
        Ok(format!("{}/api/calls/audio/{key}", self.public_base_url))
    }
}

/// Downloads a provider-hosted recording and archives a copy in the media
/// store. Returns the archive URL, or `None` on any failure — archiving is
/// best-effort and must never break the conversational turn.
pub async fn archive_recording(
    http: &reqwest::Client,
    store: &dyn MediaStore,
    recording_url: &str,
    call_sid: &str,
) -> Option<String> {
    match try_archive(http, store, recording_url, call_sid).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(call_sid, recording_url, "failed to archive recording: {}", e);
            None
        }
    }
}

async fn try_archive(
    http: &reqwest::Client,
    store: &dyn MediaStore,
    recording_url: &str,
    call_sid: &str,
) -> Result<String, VoiceError> {
    let response = http
        .get(recording_url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(VoiceError::Provider {
            status: status.as_u16(),
            message: format!("recording download failed from {recording_url}"),
        });
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RECORDING_BYTES {
        return Err(VoiceError::InputTooLarge {
            actual: bytes.len(),
            limit: MAX_RECORDING_BYTES,
        });
    }

    let key = format!("rec-{call_sid}-{}.wav", Uuid::new_v4().simple());
    store.put(&key, bytes.to_vec()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_writes_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path(), "https://calls.example.com/");

        let url = store.put("tts-abc.mp3", b"mp3-bytes".to_vec()).await.unwrap();
        assert_eq!(url, "https://calls.example.com/api/calls/audio/tts-abc.mp3");

        let stored = std::fs::read(dir.path().join("tts-abc.mp3")).unwrap();
        assert_eq!(stored, b"mp3-bytes");
    }

    #[tokio::test]
    async fn archive_failure_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path(), "https://calls.example.com");
        let http = reqwest::Client::new();

        // Nothing listens on this port; the download fails and archiving
        // degrades to None instead of erroring.
        let archived =
            archive_recording(&http, &store, "http://127.0.0.1:1/rec.wav", "CA1").await;
        assert!(archived.is_none());
    }
}
