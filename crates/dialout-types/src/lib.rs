//! Shared domain types for the Dialout platform.
//!
//! Defines the call session and interaction records that every other crate
//! operates on, plus voice profile configuration for speech synthesis.
//! These types carry no behavior beyond validation and string mapping; the
//! ledger crate owns persistence and the server crate owns orchestration.

mod call;
mod voice;

pub use call::{
    CallInteraction, CallSession, CallStatus, InteractionKind, NewInteraction,
    ParseCallStatusError, ParseInteractionKindError, TranscriptSource,
};
pub use voice::VoiceProfile;
