//! Call session and interaction record types.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a call session.
///
/// Statuses are rank-ordered and only move forward: a session never returns
/// to an earlier status, and the four provider-terminal statuses
/// (`completed`, `failed`, `no_answer`, `busy`) are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Registered for a future fire time; no provider call exists yet.
    Scheduled,
    /// The provider accepted the call creation request.
    Initiated,
    /// The callee's phone is ringing.
    Ringing,
    /// The conversation is underway (also the bootstrap status for sessions
    /// first seen via an inbound webhook).
    InProgress,
    /// The call ended normally.
    Completed,
    /// The provider reported a failure.
    Failed,
    /// The callee did not pick up.
    NoAnswer,
    /// The callee's line was busy.
    Busy,
}

impl CallStatus {
    /// Returns the canonical string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
        }
    }

    /// Ordering rank used to enforce forward-only transitions. All terminal
    /// statuses share the highest rank so no terminal status can replace
    /// another.
    pub fn rank(self) -> u8 {
        match self {
            Self::Scheduled => 0,
            Self::Initiated => 1,
            Self::Ringing => 2,
            Self::InProgress => 3,
            Self::Completed | Self::Failed | Self::NoAnswer | Self::Busy => 4,
        }
    }

    /// Whether this status ends the session lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::NoAnswer | Self::Busy
        )
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallStatus {
    type Err = ParseCallStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "initiated" => Ok(Self::Initiated),
            "ringing" => Ok(Self::Ringing),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "no_answer" => Ok(Self::NoAnswer),
            "busy" => Ok(Self::Busy),
            _ => Err(ParseCallStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown call status string.
#[derive(Debug, Clone)]
pub struct ParseCallStatusError(pub String);

impl std::fmt::Display for ParseCallStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown call status: {}", self.0)
    }
}

impl std::error::Error for ParseCallStatusError {}

/// One outbound or inbound call.
///
/// `call_sid` is the provider's call identifier; it is unique and immutable
/// once assigned. Sessions are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Internal session id (UUID).
    pub id: String,
    /// Provider call id (e.g. a Twilio `CA…` sid). For scheduled sessions a
    /// placeholder job key until the provider call is created.
    pub call_sid: String,
    /// Originating phone number.
    pub from_number: String,
    /// Destination phone number.
    pub to_number: String,
    /// Current lifecycle status.
    pub status: CallStatus,
    /// Call duration in seconds, once known.
    pub duration_secs: i64,
    /// Provider-reported start time (RFC 3339), if any.
    pub start_time: Option<String>,
    /// Provider-reported end time (RFC 3339), if any.
    pub end_time: Option<String>,
    /// The message spoken on the outbound leg.
    pub initial_message: Option<String>,
    /// Voice profile id used for synthesis.
    pub voice_id: Option<String>,
    /// Row creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Kind of a single conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A speech-recognition result delivered by the provider's Gather verb.
    Speech,
    /// A recorded utterance (with archive locator and inline transcript when
    /// transcription finished within the webhook deadline).
    Recording,
    /// A standalone transcript, either the primary channel arriving after
    /// its recording turn or the provider's secondary channel.
    Transcription,
}

impl InteractionKind {
    /// Returns the canonical string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Recording => "recording",
            Self::Transcription => "transcription",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = ParseInteractionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speech" => Ok(Self::Speech),
            "recording" => Ok(Self::Recording),
            "transcription" => Ok(Self::Transcription),
            _ => Err(ParseInteractionKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown interaction kind string.
#[derive(Debug, Clone)]
pub struct ParseInteractionKindError(pub String);

impl std::fmt::Display for ParseInteractionKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown interaction kind: {}", self.0)
    }
}

impl std::error::Error for ParseInteractionKindError {}

/// Which transcription channel produced a transcript.
///
/// The primary (speech-to-text service) and secondary (provider-native)
/// channels are recorded independently and never reconciled; neither is
/// declared authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// The primary speech-to-text service.
    Primary,
    /// The telephony provider's built-in transcription.
    Secondary,
}

impl TranscriptSource {
    /// Returns the canonical string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// One turn within a call session. Immutable once written; ordered by
/// `sequence_number`, which the ledger guarantees is contiguous from 1 per
/// session even under concurrent webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInteraction {
    /// Interaction id (UUID).
    pub id: String,
    /// Owning session id.
    pub call_session_id: String,
    /// Kind of turn.
    pub kind: InteractionKind,
    /// Position within the session, starting at 1.
    pub sequence_number: i64,

    /// Recognized text from a speech turn.
    pub speech_result: Option<String>,
    /// Recognition confidence reported by the provider.
    pub speech_confidence: Option<f64>,

    /// Provider recording id.
    pub recording_sid: Option<String>,
    /// Provider-hosted recording URL.
    pub recording_url: Option<String>,
    /// Recording length in seconds.
    pub recording_duration: Option<i64>,
    /// Archived copy of the recording in the media store.
    pub archive_url: Option<String>,

    /// Transcript text.
    pub transcription_text: Option<String>,
    /// Which channel produced the transcript.
    pub transcription_source: Option<TranscriptSource>,
    /// Transcription confidence, when the channel reports one.
    pub transcription_confidence: Option<f64>,

    /// The reply spoken back to the caller for this turn.
    pub response_text: Option<String>,
    /// Synthesized audio URL for the reply, when synthesis succeeded.
    pub response_audio_url: Option<String>,
    /// Wall-clock time spent producing this turn, in milliseconds.
    pub processing_time_ms: Option<i64>,
    /// Error recorded while producing this turn, if any.
    pub error_message: Option<String>,
    /// Row creation timestamp.
    pub created_at: String,
}

/// Payload for appending one interaction to the ledger. The ledger assigns
/// the id, sequence number, and creation timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewInteraction {
    pub kind: Option<InteractionKind>,
    pub speech_result: Option<String>,
    pub speech_confidence: Option<f64>,
    pub recording_sid: Option<String>,
    pub recording_url: Option<String>,
    pub recording_duration: Option<i64>,
    pub archive_url: Option<String>,
    pub transcription_text: Option<String>,
    pub transcription_source: Option<TranscriptSource>,
    pub transcription_confidence: Option<f64>,
    pub response_text: Option<String>,
    pub response_audio_url: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub error_message: Option<String>,
}

impl NewInteraction {
    /// A speech-recognition turn.
    pub fn speech(result: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            kind: Some(InteractionKind::Speech),
            speech_result: Some(result.into()),
            speech_confidence: confidence,
            ..Self::default()
        }
    }

    /// A recorded-utterance turn.
    pub fn recording(
        recording_sid: impl Into<String>,
        recording_url: impl Into<String>,
        duration_secs: Option<i64>,
    ) -> Self {
        Self {
            kind: Some(InteractionKind::Recording),
            recording_sid: Some(recording_sid.into()),
            recording_url: Some(recording_url.into()),
            recording_duration: duration_secs,
            ..Self::default()
        }
    }

    /// A standalone transcript turn.
    pub fn transcription(text: impl Into<String>, source: TranscriptSource) -> Self {
        Self {
            kind: Some(InteractionKind::Transcription),
            transcription_text: Some(text.into()),
            transcription_source: Some(source),
            ..Self::default()
        }
    }

    /// The interaction kind, defaulting to `Speech` when unset.
    pub fn kind(&self) -> InteractionKind {
        self.kind.unwrap_or(InteractionKind::Speech)
    }

    /// The transcript-or-speech text used by the mirror log.
    pub fn transcript(&self) -> Option<&str> {
        self.transcription_text
            .as_deref()
            .or(self.speech_result.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            CallStatus::Scheduled,
            CallStatus::Initiated,
            CallStatus::Ringing,
            CallStatus::InProgress,
            CallStatus::Completed,
            CallStatus::Failed,
            CallStatus::NoAnswer,
            CallStatus::Busy,
        ] {
            let parsed: CallStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("hung_up".parse::<CallStatus>().is_err());
    }

    #[test]
    fn status_ranks_only_move_forward() {
        assert!(CallStatus::Scheduled.rank() < CallStatus::Initiated.rank());
        assert!(CallStatus::Initiated.rank() < CallStatus::InProgress.rank());
        assert!(CallStatus::InProgress.rank() < CallStatus::Completed.rank());
        // Terminal statuses share a rank: none replaces another.
        assert_eq!(CallStatus::Completed.rank(), CallStatus::Busy.rank());
        assert!(CallStatus::Failed.is_terminal());
        assert!(!CallStatus::Ringing.is_terminal());
    }

    #[test]
    fn new_interaction_constructors_set_kind() {
        assert_eq!(
            NewInteraction::speech("hi", Some(0.9)).kind(),
            InteractionKind::Speech
        );
        assert_eq!(
            NewInteraction::recording("RE1", "https://x/r.wav", Some(4)).kind(),
            InteractionKind::Recording
        );
        let t = NewInteraction::transcription("hello", TranscriptSource::Secondary);
        assert_eq!(t.kind(), InteractionKind::Transcription);
        assert_eq!(t.transcript(), Some("hello"));
    }
}
