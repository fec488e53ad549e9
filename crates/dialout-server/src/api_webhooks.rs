//! Webhook handlers for the telephony provider's conversation callbacks.
//!
//! These handlers are the conversational loop: the provider POSTs each
//! speech result, recording, and transcript here, and the markup we answer
//! with decides the call's next move. Two rules hold on every path:
//!
//! - The provider always gets call-control markup back. A handler failure
//!   maps to a spoken apology plus a retry verb, never an HTTP error that
//!   would drop the call. (The transcription callback is the exception: the
//!   provider ignores its body, so it answers in plain text.)
//! - Slow work never spends the provider's response deadline. Recording
//!   archival and transcription race a bounded deadline on the worker pool;
//!   results that miss it are appended to the ledger as a standalone
//!   transcript turn when they arrive.

use axum::extract::{Extension, Form};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use dialout_dialog::{reply_to_transcript, respond};
use dialout_ledger::{advance_status, bootstrap_session};
use dialout_telephony::twiml;
use dialout_telephony::twiml::{Gather, Record, Say};
use dialout_types::{
    CallSession, CallStatus, InteractionKind, NewInteraction, TranscriptSource, VoiceProfile,
};
use dialout_voice::archive_recording;

use crate::error::ApiError;
use crate::{with_conn, xml_response, AppState};

/// Form body of the speech-gathering callback. The provider sends numeric
/// fields as strings, so they are parsed leniently rather than failing the
/// whole request.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
    #[serde(rename = "Confidence", default)]
    pub confidence: Option<String>,
}

/// Form body of the recording callback.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "RecordingSid", default)]
    pub recording_sid: Option<String>,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingDuration", default)]
    pub recording_duration: Option<String>,
}

/// Form body of the provider's secondary transcription callback.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "TranscriptionText", default)]
    pub transcription_text: Option<String>,
    #[serde(rename = "TranscriptionStatus", default)]
    pub transcription_status: Option<String>,
    #[serde(rename = "RecordingSid", default)]
    pub recording_sid: Option<String>,
}

/// Handler for `POST /api/calls/handle-speech`.
pub async fn handle_speech(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<SpeechForm>,
) -> Response {
    let call_sid = form.call_sid.clone();
    match speech_turn(&state, form).await {
        Ok(xml) => xml_response(xml),
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "speech webhook failed: {}", e);
            xml_response(speech_retry_markup(&state.public_url))
        }
    }
}

async fn speech_turn(state: &Arc<AppState>, form: SpeechForm) -> Result<String, ApiError> {
    let started = Instant::now();
    let utterance = form.speech_result.unwrap_or_default();
    let confidence = form.confidence.as_deref().and_then(|c| c.parse::<f64>().ok());

    let decision = respond(&utterance);
    tracing::info!(
        call_sid = %form.call_sid,
        matched = decision.matched.unwrap_or("<none>"),
        terminates = decision.terminates,
        "speech turn"
    );

    let ledger = state.ledger.clone();
    let call_sid = form.call_sid.clone();
    let reply = decision.reply.clone();
    let terminates = decision.terminates;
    let processing_ms = started.elapsed().as_millis() as i64;
    with_conn(state, move |conn| {
        let session = bootstrap_session(conn, &call_sid)?;
        advance_status(conn, &session.id, CallStatus::InProgress)?;

        let mut turn = NewInteraction::speech(utterance, confidence);
        turn.response_text = Some(reply);
        turn.processing_time_ms = Some(processing_ms);
        ledger.append(conn, &session, &turn)?;

        if terminates {
            advance_status(conn, &session.id, CallStatus::Completed)?;
        }
        Ok(())
    })
    .await?;

    let xml = if decision.terminates {
        twiml::Response::new()
            .say(Say::new(&decision.reply).voice("alice").speed("slow"))
            .hangup()
            .to_xml()
    } else {
        let action = format!("{}/api/calls/handle-speech", state.public_url);
        twiml::Response::new()
            .gather(Gather::speech(&action, Say::new(&decision.reply).speed("slow")))
            // A second listening window before giving up on a silent caller.
            .say(Say::new("I didn't hear anything. Let me try again."))
            .gather(Gather::speech(
                &action,
                Say::new("Please speak now. I'm here to help!"),
            ))
            .say(Say::new("Thank you for calling. Have a great day!"))
            .hangup()
            .to_xml()
    };
    Ok(xml)
}

/// Handler for `POST /api/calls/handle-recording`.
pub async fn handle_recording(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<RecordingForm>,
) -> Response {
    let call_sid = form.call_sid.clone();
    match recording_turn(&state, form).await {
        Ok(xml) => xml_response(xml),
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "recording webhook failed: {}", e);
            xml_response(recording_retry_markup(&state.public_url))
        }
    }
}

async fn recording_turn(state: &Arc<AppState>, form: RecordingForm) -> Result<String, ApiError> {
    let started = Instant::now();
    let recording_url = form
        .recording_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Validation("recording callback without a URL".to_string()))?
        .to_string();
    let recording_duration = form
        .recording_duration
        .as_deref()
        .and_then(|d| d.parse::<i64>().ok());

    let call_sid = form.call_sid.clone();
    let session = with_conn(state, move |conn| {
        let session = bootstrap_session(conn, &call_sid)?;
        advance_status(conn, &session.id, CallStatus::InProgress)?;
        Ok(session)
    })
    .await?;

    // Archive the recording and transcribe it, racing the webhook deadline.
    // A result that misses the deadline is appended later as its own turn.
    let http = state.http.clone();
    let store = Arc::clone(&state.media_store);
    let transcriber = Arc::clone(&state.transcriber);
    let work_url = recording_url.clone();
    let work_sid = session.call_sid.clone();
    let work = async move {
        tokio::join!(
            async { archive_recording(&http, store.as_ref(), &work_url, &work_sid).await },
            async { transcriber.transcribe(&work_url).await },
        )
    };

    let late_state = Arc::clone(state);
    let late_session = session.clone();
    let outcome = state
        .workers
        .run_with_deadline(
            "recording-turn",
            state.transcribe_deadline,
            work,
            move |(archive_url, transcript)| async move {
                append_late_transcript(late_state, late_session, archive_url, transcript).await;
            },
        )
        .await;
    let (archive_url, transcript) = outcome.unwrap_or((None, None));

    let reply = reply_to_transcript(transcript.as_deref());
    let profile = VoiceProfile::for_voice_id(
        session.voice_id.as_deref().unwrap_or(&state.default_voice_id),
    );
    let reply_audio = state.synthesizer.synthesize(&reply, &profile).await;

    let ledger = state.ledger.clone();
    let append_session = session.clone();
    let mut turn = NewInteraction::recording(
        form.recording_sid.clone().unwrap_or_default(),
        recording_url,
        recording_duration,
    );
    turn.archive_url = archive_url;
    turn.transcription_text = transcript.clone();
    turn.transcription_source = transcript.as_ref().map(|_| TranscriptSource::Primary);
    turn.response_text = Some(reply.clone());
    turn.response_audio_url = reply_audio.clone();
    turn.processing_time_ms = Some(started.elapsed().as_millis() as i64);
    with_conn(state, move |conn| {
        ledger.append(conn, &append_session, &turn)?;
        Ok(())
    })
    .await?;

    let recording_action = format!("{}/api/calls/handle-recording", state.public_url);
    let transcription_action = format!("{}/api/calls/handle-transcription", state.public_url);
    let response = match &reply_audio {
        Some(url) => twiml::Response::new().play(url),
        None => twiml::Response::new().say(Say::new(&reply).voice("alice")),
    };
    Ok(response
        .record(
            Record::new(&recording_action)
                .transcribe_to(&transcription_action)
                .status_callback(&recording_action),
        )
        .to_xml())
}

/// Appends a transcript (and/or archive locator) that finished after its
/// recording turn was already written.
async fn append_late_transcript(
    state: Arc<AppState>,
    session: CallSession,
    archive_url: Option<String>,
    transcript: Option<String>,
) {
    if archive_url.is_none() && transcript.is_none() {
        return;
    }

    let ledger = state.ledger.clone();
    let call_sid = session.call_sid.clone();
    let result = with_conn(&state, move |conn| {
        let mut turn = match transcript {
            Some(text) => NewInteraction::transcription(text, TranscriptSource::Primary),
            None => NewInteraction {
                kind: Some(InteractionKind::Transcription),
                ..NewInteraction::default()
            },
        };
        turn.archive_url = archive_url;
        ledger.append(conn, &session, &turn)?;
        Ok(())
    })
    .await;

    match result {
        Ok(()) => tracing::info!(call_sid = %call_sid, "late transcript appended"),
        Err(e) => tracing::warn!(call_sid = %call_sid, "failed to append late transcript: {}", e),
    }
}

/// Handler for `POST /api/calls/handle-transcription`.
///
/// The provider's secondary transcription channel. Recorded independently
/// of the primary channel and never reconciled with it; the provider
/// ignores the response body, so this answers in plain text.
pub async fn handle_transcription(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<TranscriptionForm>,
) -> Response {
    let call_sid = form.call_sid.clone();
    match transcription_turn(&state, form).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "transcription webhook failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
        }
    }
}

async fn transcription_turn(
    state: &Arc<AppState>,
    form: TranscriptionForm,
) -> Result<(), ApiError> {
    let text = form
        .transcription_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let Some(text) = text else {
        tracing::info!(
            call_sid = %form.call_sid,
            status = form.transcription_status.as_deref().unwrap_or("<none>"),
            "secondary transcription callback without text"
        );
        return Ok(());
    };

    let ledger = state.ledger.clone();
    let call_sid = form.call_sid.clone();
    let text = text.to_string();
    let recording_sid = form.recording_sid.clone();
    with_conn(state, move |conn| {
        let session = bootstrap_session(conn, &call_sid)?;
        let mut turn = NewInteraction::transcription(text, TranscriptSource::Secondary);
        turn.recording_sid = recording_sid;
        ledger.append(conn, &session, &turn)?;
        Ok(())
    })
    .await
}

/// Apology markup for a failed speech turn: retry the gather, never drop
/// the call with an HTTP error.
fn speech_retry_markup(public_url: &str) -> String {
    let action = format!("{public_url}/api/calls/handle-speech");
    twiml::Response::new()
        .say(Say::new("Sorry, I didn't understand that. Please try again."))
        .gather(Gather::speech(
            &action,
            Say::new("What would you like me to help you with?"),
        ))
        .say(Say::new("Thank you for calling. Goodbye!"))
        .hangup()
        .to_xml()
}

/// Apology markup for a failed recording turn: apologize and record again.
fn recording_retry_markup(public_url: &str) -> String {
    let recording_action = format!("{public_url}/api/calls/handle-recording");
    let transcription_action = format!("{public_url}/api/calls/handle-transcription");
    twiml::Response::new()
        .say(Say::new("Sorry, there was an error. Let me try again.").voice("alice"))
        .record(
            Record::new(&recording_action)
                .transcribe_to(&transcription_action)
                .status_callback(&recording_action),
        )
        .to_xml()
}
