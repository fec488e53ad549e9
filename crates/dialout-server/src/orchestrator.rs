//! Outbound call orchestration.
//!
//! One entry point, [`place_call`], covers both shapes of the make-call
//! operation: dial immediately, or register a one-shot scheduler job and
//! dial when it fires. Scheduled calls pre-create their session row (status
//! `scheduled`, placeholder call sid) so they are visible to the dashboard
//! before any provider call exists; the row is activated with the real call
//! sid once dialing succeeds.

use serde::Deserialize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dialout_ledger::{activate_scheduled_session, advance_status, create_session, NewSession};
use dialout_telephony::twiml::{Record, Response, Say};
use dialout_telephony::CallCreated;
use dialout_types::{CallStatus, VoiceProfile};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{with_conn, AppState};

/// Request body for `POST /api/calls/make-call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRequest {
    /// Destination phone number.
    pub to: String,
    /// The message spoken when the callee answers.
    pub message: String,
    /// Optional RFC 3339 fire time; present means schedule instead of dial.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Optional voice profile id for synthesis.
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// What `place_call` did with the request.
#[derive(Debug, Clone)]
pub enum PlaceCallOutcome {
    /// A provider call was created right away.
    Initiated { call_sid: String },
    /// A scheduler job was registered for a future fire time.
    Scheduled {
        job_id: String,
        scheduled_time: String,
    },
}

/// Validates a call request and either dials immediately or registers a
/// scheduled job.
///
/// # Errors
///
/// Returns `ApiError::Validation` for an empty destination or message, an
/// unparseable schedule time, or a schedule time not in the future;
/// `ApiError::Provider` when the immediate dial fails upstream.
pub async fn place_call(
    state: Arc<AppState>,
    request: CallRequest,
) -> Result<PlaceCallOutcome, ApiError> {
    let to = request.to.trim().to_string();
    let message = request.message.trim().to_string();
    if to.is_empty() {
        return Err(ApiError::Validation(
            "'to' phone number is required".to_string(),
        ));
    }
    if message.is_empty() {
        return Err(ApiError::Validation("'message' is required".to_string()));
    }

    let voice_id = request
        .voice_id
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| state.default_voice_id.clone());

    match request.schedule.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(schedule) => schedule_call(state, to, message, voice_id, schedule).await,
        None => {
            let created = dial(state, to, message, voice_id, None).await?;
            Ok(PlaceCallOutcome::Initiated {
                call_sid: created.call_sid,
            })
        }
    }
}

async fn schedule_call(
    state: Arc<AppState>,
    to: String,
    message: String,
    voice_id: String,
    schedule: &str,
) -> Result<PlaceCallOutcome, ApiError> {
    let at: DateTime<Utc> = DateTime::parse_from_rfc3339(schedule)
        .map_err(|e| ApiError::Validation(format!("invalid schedule time '{schedule}': {e}")))?
        .with_timezone(&Utc);
    if at <= Utc::now() {
        return Err(ApiError::Validation(
            "schedule time must be in the future".to_string(),
        ));
    }

    // A fresh uuid per request: the scheduler upserts by key, so a reused
    // key would silently replace another pending call's job.
    let job_id = format!("call-{}", Uuid::new_v4());

    // Pre-create the session so the scheduled call is visible before any
    // provider call exists. The job id stands in for the call sid until
    // dialing succeeds.
    let session = {
        let new = NewSession {
            call_sid: job_id.clone(),
            from_number: state.from_number.clone(),
            to_number: to.clone(),
            status: Some(CallStatus::Scheduled),
            initial_message: Some(message.clone()),
            voice_id: Some(voice_id.clone()),
        };
        with_conn(&state, move |conn| Ok(create_session(conn, &new)?)).await?
    };

    let job_state = Arc::clone(&state);
    let session_id = session.id.clone();
    let job_to = to.clone();
    state
        .scheduler
        .schedule_once(&job_id, at, move || async move {
            match dial(job_state, job_to, message, voice_id, Some(session_id)).await {
                Ok(created) => {
                    tracing::info!(call_sid = %created.call_sid, "scheduled call dialed");
                }
                Err(e) => {
                    tracing::error!("scheduled call failed: {}", e);
                }
            }
        })
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    tracing::info!(job_id = %job_id, to = %to, %at, "call scheduled");
    Ok(PlaceCallOutcome::Scheduled {
        job_id,
        // Echo the caller's own timestamp rather than a re-rendered one.
        scheduled_time: schedule.to_string(),
    })
}

/// Creates the provider call for the outbound leg and records its session.
///
/// The outbound markup plays synthesized audio when synthesis succeeds and
/// falls back to the provider's native `<Say>` when it does not, then
/// records the callee's answer with both transcription channels pointed at
/// our webhooks.
pub(crate) async fn dial(
    state: Arc<AppState>,
    to: String,
    message: String,
    voice_id: String,
    scheduled_session_id: Option<String>,
) -> Result<CallCreated, ApiError> {
    let profile = VoiceProfile::for_voice_id(&voice_id);
    let audio_url = state.synthesizer.synthesize(&message, &profile).await;

    let recording_action = format!("{}/api/calls/handle-recording", state.public_url);
    let transcription_action = format!("{}/api/calls/handle-transcription", state.public_url);

    let response = match &audio_url {
        Some(url) => Response::new().play(url),
        None => Response::new().say(Say::new(&message).voice("alice")),
    };
    let xml = response
        .record(
            Record::new(&recording_action)
                .transcribe_to(&transcription_action)
                .status_callback(&recording_action),
        )
        .to_xml();

    let created = match state
        .telephony
        .create_call(&to, &state.from_number, &xml)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            if let Some(session_id) = scheduled_session_id {
                let result = with_conn(&state, move |conn| {
                    Ok(advance_status(conn, &session_id, CallStatus::Failed)?)
                })
                .await;
                if let Err(store_err) = result {
                    tracing::error!("failed to mark scheduled session failed: {}", store_err);
                }
            }
            return Err(e.into());
        }
    };

    // Record the session. The provider call is already live, so a storage
    // failure is logged rather than surfaced as a dial failure.
    let call_sid = created.call_sid.clone();
    let from_number = state.from_number.clone();
    let stored = with_conn(&state, move |conn| match scheduled_session_id {
        Some(session_id) => Ok(activate_scheduled_session(conn, &session_id, &call_sid)
            .map(|_| ())?),
        None => {
            let new = NewSession {
                call_sid,
                from_number,
                to_number: to,
                status: Some(CallStatus::Initiated),
                initial_message: Some(message),
                voice_id: Some(voice_id),
            };
            create_session(conn, &new).map(|_| ()).map_err(Into::into)
        }
    })
    .await;
    if let Err(e) = stored {
        tracing::error!(call_sid = %created.call_sid, "failed to record call session: {}", e);
    }

    tracing::info!(
        call_sid = %created.call_sid,
        status = %created.status,
        played_audio = audio_url.is_some(),
        "outbound call created"
    );
    Ok(created)
}
