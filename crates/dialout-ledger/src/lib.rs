//! Call Interaction Ledger for the Dialout platform.
//!
//! The ledger is the ordered, append-only record of everything that happened
//! in one call. Every conversational turn — a speech result, a recorded
//! utterance, a transcript — is appended through [`Ledger::append`], which
//! assigns a per-session sequence number atomically inside the INSERT
//! statement. For any session the sequence numbers are exactly `1..n`, with
//! no gaps or duplicates, even when webhooks for the same call arrive
//! concurrently.
//!
//! Secondary sinks implement [`LedgerSink`] and receive one structured entry
//! per append. Sinks are best-effort and explicitly non-authoritative: a
//! sink failure is logged and never fails the primary write. The shipped
//! [`JsonlMirror`] writes one JSON object per line for the dashboard's
//! degraded read path.

mod error;
mod mirror;
mod store;

pub use error::LedgerError;
pub use mirror::{read_mirror_tail, JsonlMirror, LedgerSink, MirrorEntry};
pub use store::{
    activate_scheduled_session, advance_status, bootstrap_session, create_session,
    find_session_by_call_sid, get_session, recent_sessions, sweep_stale_sessions, Ledger,
    NewSession, RecentSession,
};
