//! Dialout server library logic.
//!
//! Wires the call orchestrator, webhook handlers, and dashboard endpoints
//! into one axum router over shared [`AppState`]. Provider clients are held
//! as trait objects so integration tests drive the full HTTP surface with
//! fakes.

pub mod api_calls;
pub mod api_interactions;
pub mod api_webhooks;
pub mod background;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod workers;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use dialout_db::DbPool;
use dialout_ledger::Ledger;
use dialout_scheduler::JobScheduler;
use dialout_telephony::TelephonyClient;
use dialout_voice::{FsMediaStore, SpeechSynthesizer, Transcriber};

use error::ApiError;
use workers::WorkerPool;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// The interaction ledger (primary store plus mirror sinks).
    pub ledger: Ledger,
    /// Telephony provider client.
    pub telephony: Arc<dyn TelephonyClient>,
    /// Speech synthesis adapter.
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Transcription adapter.
    pub transcriber: Arc<dyn Transcriber>,
    /// Media store for synthesized and archived audio.
    pub media_store: Arc<FsMediaStore>,
    /// Shared HTTP client for recording downloads.
    pub http: reqwest::Client,
    /// Deferred-job registry (scheduled calls, housekeeping).
    pub scheduler: JobScheduler,
    /// Bounded pool for background work.
    pub workers: WorkerPool,
    /// Externally reachable base URL for webhook and audio links.
    pub public_url: String,
    /// The number outbound calls originate from.
    pub from_number: String,
    /// Voice profile id used when a request names none.
    pub default_voice_id: String,
    /// How long a recording webhook waits for transcription before replying.
    pub transcribe_deadline: Duration,
    /// Path of the JSONL mirror file.
    pub mirror_path: PathBuf,
}

/// Runs a closure against a pooled database connection on the blocking
/// thread pool. All SQLite work in handlers goes through here so the async
/// runtime never blocks on a database lock.
pub(crate) async fn with_conn<T, F>(state: &Arc<AppState>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::Internal(format!("db connection failed: {e}")))?;
        op(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("task join error: {e}")))?
}

/// Wraps call-control markup in an XML response.
pub(crate) fn xml_response(xml: String) -> axum::response::Response {
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/calls/make-call", post(api_calls::make_call_handler))
        .route("/api/calls/audio/{filename}", get(api_calls::serve_audio_handler))
        .route("/api/calls/twiml", get(api_calls::twiml_handler))
        .route("/api/calls/list", get(api_calls::list_calls_handler))
        .route("/api/calls/status/{call_sid}", get(api_calls::call_status_handler))
        .route("/api/calls/handle-speech", post(api_webhooks::handle_speech))
        .route("/api/calls/handle-recording", post(api_webhooks::handle_recording))
        .route(
            "/api/calls/handle-transcription",
            post(api_webhooks::handle_transcription),
        )
        .route(
            "/api/calls/recent-interactions",
            get(api_interactions::recent_interactions_handler),
        )
        .route(
            "/api/calls/recent-interactions-temp",
            get(api_interactions::recent_interactions_temp_handler),
        )
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
