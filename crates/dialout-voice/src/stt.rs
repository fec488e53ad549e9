//! Transcription Adapter: recording URL → text.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::VoiceError;

/// Maximum audio input size for transcription (10 MiB).
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Bounded timeout applied separately to the download and the provider call.
const STT_TIMEOUT: Duration = Duration::from_secs(30);

const OPENAI_API_BASE: &str = "https://api.openai.com";

/// Turns a recorded utterance into text.
///
/// `None` means transcription failed for any reason; the failure is
/// non-fatal to the conversation — callers land on the "didn't hear
/// anything" reply branch.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording_url: &str) -> Option<String>;
}

/// OpenAI Whisper transcription: download the recording, submit it as
/// multipart form data, return the trimmed text body.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: OPENAI_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Overrides the provider base URL (tests point this at a local stub).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn try_transcribe(&self, recording_url: &str) -> Result<String, VoiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(VoiceError::MissingApiKey("OpenAI"))?;

        let download = self
            .http
            .get(recording_url)
            .timeout(STT_TIMEOUT)
            .send()
            .await?;
        let status = download.status();
        if !status.is_success() {
            return Err(VoiceError::Provider {
                status: status.as_u16(),
                message: format!("recording download failed from {recording_url}"),
            });
        }

        let audio = download.bytes().await?;
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::InputTooLarge {
                actual: audio.len(),
                limit: MAX_STT_INPUT_BYTES,
            });
        }

        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .text("response_format", "text")
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("recording.wav")
                    .mime_str("audio/wav")?,
            );

        let response = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.api_base))
            .bearer_auth(api_key)
            .multipart(form)
            .timeout(STT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(VoiceError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Option<String> {
        match self.try_transcribe(recording_url).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(
                    recording_url,
                    "transcription failed, caller falls back to the no-transcript branch: {}",
                    e
                );
                None
            }
        }
    }
}
