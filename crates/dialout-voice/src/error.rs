//! Error types for the speech adapters.

use thiserror::Error;

/// Errors from the speech synthesis / transcription / media layers.
///
/// These surface in logs only: the adapter traits flatten every failure to
/// `None` at their public boundary so callers branch to fallbacks instead
/// of handling provider-specific errors.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// A required API credential is not configured.
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),

    /// The HTTP request failed (network, timeout, TLS).
    #[error("speech provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("speech provider error ({status}): {message}")]
    Provider {
        /// HTTP status returned by the provider.
        status: u16,
        /// Response body or provider message.
        message: String,
    },

    /// Input exceeds the adapter's size guard.
    #[error("input exceeds maximum size: {actual} bytes (limit: {limit} bytes)")]
    InputTooLarge {
        /// Actual input size.
        actual: usize,
        /// The configured limit.
        limit: usize,
    },

    /// Reading or writing the media store failed.
    #[error("media store error: {0}")]
    Storage(#[from] std::io::Error),
}
