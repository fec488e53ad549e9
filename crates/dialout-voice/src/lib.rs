//! Speech provider adapters for the Dialout platform.
//!
//! Provides the Speech Synthesis Adapter (text → playable audio URL), the
//! Transcription Adapter (recording URL → text), and the media store the
//! synthesizer uploads into.
//!
//! Both adapters share one load-bearing contract: on any provider failure
//! they return `None`, and the caller selects the fallback path — native
//! `<Say>` markup instead of `<Play>` for synthesis, the "didn't hear
//! anything" reply branch for transcription. Conversations degrade, they
//! never die with a provider.

mod error;
mod media;
mod stt;
mod tts;

pub use error::VoiceError;
pub use media::{archive_recording, FsMediaStore, MediaStore};
pub use stt::{Transcriber, WhisperTranscriber};
pub use tts::{ElevenLabsSynthesizer, SpeechSynthesizer};
