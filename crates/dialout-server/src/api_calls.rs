//! JSON API handlers for placing and inspecting calls, plus audio serving.

use axum::extract::{Extension, Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use dialout_telephony::twiml;

use crate::error::ApiError;
use crate::orchestrator::{place_call, CallRequest, PlaceCallOutcome};
use crate::{xml_response, AppState};

/// Handler for `POST /api/calls/make-call`.
pub async fn make_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CallRequest>,
) -> Result<Json<Value>, ApiError> {
    match place_call(state, request).await? {
        PlaceCallOutcome::Initiated { call_sid } => Ok(Json(json!({
            "success": true,
            "status": "initiated",
            "call_sid": call_sid,
        }))),
        PlaceCallOutcome::Scheduled {
            job_id,
            scheduled_time,
        } => Ok(Json(json!({
            "success": true,
            "status": "scheduled",
            "job_id": job_id,
            "scheduled_time": scheduled_time,
        }))),
    }
}

/// Handler for `GET /api/calls/audio/{filename}`.
///
/// Serves synthesized and archived audio out of the media directory. Keys
/// are flat filenames; anything that could traverse out of the directory is
/// rejected before touching the filesystem.
pub async fn serve_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(ApiError::Validation(format!(
            "invalid audio filename: {filename}"
        )));
    }

    let path = state.media_store.root().join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "audio/mpeg")],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(format!("audio file {filename}")))
        }
        Err(e) => Err(ApiError::Internal(format!(
            "failed to read audio file: {e}"
        ))),
    }
}

/// Query parameters for `GET /api/calls/twiml`. The provider sends its form
/// keys capitalized.
#[derive(Debug, Deserialize)]
pub struct TwimlQuery {
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "AudioFile")]
    pub audio_file: Option<String>,
}

/// Handler for `GET /api/calls/twiml`.
///
/// Standalone markup endpoint: plays the named audio file when one is
/// given, otherwise speaks the message, then gathers speech into the
/// conversational loop.
pub async fn twiml_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TwimlQuery>,
) -> Response {
    let speech_action = format!("{}/api/calls/handle-speech", state.public_url);

    let response = match &query.audio_file {
        Some(file) if !file.trim().is_empty() => twiml::Response::new().play(format!(
            "{}/api/calls/audio/{}",
            state.public_url,
            file.trim()
        )),
        _ => {
            let message = query
                .message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("Hello! This is a call from your personal assistant.");
            twiml::Response::new().say(twiml::Say::new(message).voice("alice"))
        }
    };

    let xml = response
        .gather(twiml::Gather::speech(
            &speech_action,
            twiml::Say::new("Please tell me what you need."),
        ))
        .say(twiml::Say::new("Thank you for calling. Goodbye!"))
        .hangup()
        .to_xml();

    xml_response(xml)
}

/// Handler for `GET /api/calls/list`.
pub async fn list_calls_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let calls = state.telephony.list_calls(20).await?;
    Ok(Json(json!({
        "success": true,
        "calls": calls,
    })))
}

/// Handler for `GET /api/calls/status/{call_sid}`.
pub async fn call_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_sid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let call = state.telephony.fetch_call(&call_sid).await?;
    Ok(Json(json!({
        "success": true,
        "call": call,
    })))
}
