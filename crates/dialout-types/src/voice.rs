//! Voice profile definitions for speech synthesis.

use serde::{Deserialize, Serialize};

/// A voice profile configuration.
///
/// Maps a logical id to a synthesis-provider voice and its rendering
/// parameters. The defaults match the provider settings the platform ships
/// with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Unique identifier for the profile.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The synthesis provider's voice id.
    pub provider_voice_id: String,
    /// Voice stability (0.0–1.0).
    pub stability: f32,
    /// Similarity boost (0.0–1.0).
    pub similarity_boost: f32,
    /// Speaking rate multiplier.
    pub speaking_rate: f32,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default Voice".to_string(),
            provider_voice_id: "Zdsf4NBMlHR5zJJ72y9q".to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            speaking_rate: 0.2,
        }
    }
}

impl VoiceProfile {
    /// Builds a profile for a bare provider voice id, keeping default
    /// rendering parameters. The reserved id `default` (and an empty id)
    /// resolves to the shipped default profile.
    pub fn for_voice_id(voice_id: &str) -> Self {
        let voice_id = voice_id.trim();
        if voice_id.is_empty() || voice_id == "default" {
            return Self::default();
        }
        Self {
            id: voice_id.to_string(),
            name: voice_id.to_string(),
            provider_voice_id: voice_id.to_string(),
            ..Self::default()
        }
    }
}
