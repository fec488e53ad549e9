//! Conversational reply logic for the Dialout platform.
//!
//! Two rule sets live here, both deliberately data-driven and free of any
//! I/O so they can be tested exhaustively:
//!
//! - [`respond`] runs the ordered keyword table ([`RESPONSE_POLICY`])
//!   against a speech-recognition result and decides the reply and whether
//!   the call ends.
//! - [`reply_to_transcript`] generates the reply for a recorded-utterance
//!   turn from its (possibly absent) transcript.

mod policy;
mod reply;

pub use policy::{respond, PolicyDecision, PolicyEntry, ReplyKind, RESPONSE_POLICY};
pub use reply::reply_to_transcript;
