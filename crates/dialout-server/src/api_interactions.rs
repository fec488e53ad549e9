//! Dashboard endpoints over the interaction ledger.

use axum::extract::Extension;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use dialout_ledger::{read_mirror_tail, recent_sessions};

use crate::{with_conn, AppState};

/// How many sessions/entries the dashboard shows.
const RECENT_LIMIT: usize = 5;

/// Handler for `GET /api/calls/recent-interactions`.
///
/// The authoritative read path: recent sessions from the primary store,
/// each with its interactions in sequence order. Degrades to
/// `{"success": false}` instead of an HTTP error so the dashboard keeps
/// rendering.
pub async fn recent_interactions_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Value> {
    let result = with_conn(&state, |conn| {
        Ok(recent_sessions(conn, RECENT_LIMIT as i64)?)
    })
    .await;

    match result {
        Ok(sessions) => Json(json!({
            "success": true,
            "sessions": sessions,
        })),
        Err(e) => {
            tracing::error!("failed to read recent sessions: {}", e);
            Json(json!({
                "success": false,
                "error": e.to_string(),
            }))
        }
    }
}

/// Handler for `GET /api/calls/recent-interactions-temp`.
///
/// The degraded read path: the tail of the JSONL mirror file, newest first.
/// Useful when the primary store is unavailable; a missing mirror file is
/// an empty result, not an error.
pub async fn recent_interactions_temp_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Value> {
    let path = state.mirror_path.clone();
    let result =
        tokio::task::spawn_blocking(move || read_mirror_tail(&path, RECENT_LIMIT)).await;

    match result {
        Ok(Ok(entries)) => Json(json!({
            "success": true,
            "interactions": entries,
        })),
        Ok(Err(e)) => {
            tracing::error!("failed to read mirror tail: {}", e);
            Json(json!({
                "success": false,
                "error": e.to_string(),
            }))
        }
        Err(e) => Json(json!({
            "success": false,
            "error": format!("task join error: {e}"),
        })),
    }
}
