//! Speech Synthesis Adapter: text → playable audio URL.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use dialout_types::VoiceProfile;

use crate::error::VoiceError;
use crate::media::MediaStore;

/// Maximum text input size for synthesis (64 KiB).
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Bounded timeout for the synthesis provider call.
const TTS_TIMEOUT: Duration = Duration::from_secs(30);

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

/// Turns text into a publicly playable audio URL.
///
/// `None` means synthesis failed for any reason (missing credential,
/// provider error, upload failure) and the caller must fall back to the
/// telephony provider's native spoken-text directive. This contract decides
/// which markup branch (`<Play>` vs `<Say>`) every caller emits.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Option<String>;
}

/// ElevenLabs synthesis, uploading the result to the media store under a
/// fresh random key.
#[derive(Clone)]
pub struct ElevenLabsSynthesizer {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    store: Arc<dyn MediaStore>,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: Option<String>, store: Arc<dyn MediaStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: ELEVENLABS_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            store,
        }
    }

    /// Overrides the provider base URL (tests point this at a local stub).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn try_synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> Result<String, VoiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(VoiceError::MissingApiKey("ElevenLabs"))?;

        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::InputTooLarge {
                actual: text.len(),
                limit: MAX_TTS_INPUT_BYTES,
            });
        }

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.api_base, profile.provider_voice_id
        );
        let payload = json!({
            "text": text,
            "model_id": "eleven_monolingual_v1",
            "voice_settings": {
                "stability": profile.stability,
                "similarity_boost": profile.similarity_boost,
                "speaking_rate": profile.speaking_rate,
            },
        });

        let response = self
            .http
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", api_key)
            .json(&payload)
            .timeout(TTS_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), voice = %profile.provider_voice_id, "synthesis complete");

        let key = format!("tts-{}.mp3", uuid::Uuid::new_v4().simple());
        self.store.put(&key, audio.to_vec()).await
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Option<String> {
        match self.try_synthesize(text, profile).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(
                    voice = %profile.provider_voice_id,
                    "synthesis failed, caller falls back to native speech: {}",
                    e
                );
                None
            }
        }
    }
}
