//! Telephony provider integration for the Dialout platform.
//!
//! Two concerns live here:
//!
//! - [`TelephonyClient`], the seam to the telephony provider's REST API
//!   (create a call, fetch a call's status, list recent calls), with
//!   [`TwilioClient`] as the production implementation. The client is
//!   injected everywhere it is used, so tests swap in fakes.
//! - [`twiml`], the builder for the call-control markup dialect the
//!   provider executes (`Response`/`Play`/`Say`/`Gather`/`Record`/`Hangup`).

mod client;
pub mod twiml;

pub use client::{
    CallCreated, CallRecord, TelephonyClient, TelephonyError, TwilioClient, UnconfiguredTelephony,
};
