//! End-to-end tests for the call placement and inspection API.

mod common;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use common::{get, harness, post_json, HarnessOptions, FAKE_CALL_SID, FROM_NUMBER};

#[tokio::test]
async fn health_check_returns_ok() {
    let h = harness(HarnessOptions::default());
    let (status, _content_type, body) = get(h.app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn make_call_dials_and_records_session() {
    let h = harness(HarnessOptions::default());

    let (status, body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "Your package arrived"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "initiated");
    assert_eq!(body["call_sid"], FAKE_CALL_SID);

    let created = h.telephony.created();
    assert_eq!(created.len(), 1);
    let (to, from, twiml) = &created[0];
    assert_eq!(to, "+15551230000");
    assert_eq!(from, FROM_NUMBER);
    // Synthesis succeeded, so the outbound leg plays the audio URL and
    // records the answer with both callbacks pointed at our webhooks.
    assert!(twiml.contains("<Play>"), "twiml: {twiml}");
    assert!(twiml.contains("handle-recording"), "twiml: {twiml}");
    assert!(twiml.contains("handle-transcription"), "twiml: {twiml}");

    assert_eq!(
        common::session_status(&h.pool, FAKE_CALL_SID).as_deref(),
        Some("initiated")
    );
}

#[tokio::test]
async fn make_call_without_synthesis_falls_back_to_say() {
    let h = harness(HarnessOptions {
        synth_url: None,
        ..HarnessOptions::default()
    });

    let (status, _body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "Your package arrived"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let created = h.telephony.created();
    let twiml = &created[0].2;
    assert!(!twiml.contains("<Play>"), "twiml: {twiml}");
    assert!(twiml.contains("<Say"), "twiml: {twiml}");
    assert!(twiml.contains("Your package arrived"), "twiml: {twiml}");
}

#[tokio::test]
async fn make_call_validates_inputs() {
    let h = harness(HarnessOptions::default());

    let (status, body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "  ", "message": "hi"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("to"));

    let (status, _body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.telephony.created().is_empty(), "nothing was dialed");
}

#[tokio::test]
async fn unparseable_schedule_is_rejected() {
    let h = harness(HarnessOptions::default());
    let (status, body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "hi", "schedule": "tomorrow at noon"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("schedule"));
}

#[tokio::test]
async fn past_schedule_is_rejected() {
    let h = harness(HarnessOptions::default());
    let past = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    let (status, body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "hi", "schedule": past}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("future"));
    assert!(h.telephony.created().is_empty());
}

#[tokio::test]
async fn future_schedule_registers_a_job_and_a_scheduled_session() {
    let h = harness(HarnessOptions::default());
    let at = (Utc::now() + ChronoDuration::hours(1)).to_rfc3339();

    let (status, body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "reminder", "schedule": at}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");
    // The caller's own timestamp comes back unchanged.
    assert_eq!(body["scheduled_time"], at.as_str());

    let job_id = body["job_id"].as_str().unwrap();
    assert!(job_id.starts_with("call-"));
    assert!(h.scheduler.contains(job_id), "job is registered");

    // The session row exists before any provider call, keyed by the job id.
    assert_eq!(
        common::session_status(&h.pool, job_id).as_deref(),
        Some("scheduled")
    );
    assert!(h.telephony.created().is_empty(), "nothing dialed yet");
}

#[tokio::test]
async fn back_to_back_schedules_get_distinct_jobs() {
    let h = harness(HarnessOptions::default());
    let at = (Utc::now() + ChronoDuration::hours(1)).to_rfc3339();

    // Two requests landing in the same instant must not share a job key:
    // the scheduler upserts by key, and a collision would silently replace
    // the first job while its session row stayed scheduled forever.
    let (_status, first) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "first reminder", "schedule": at}),
    )
    .await;
    let (_status, second) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230001", "message": "second reminder", "schedule": at}),
    )
    .await;

    let first_id = first["job_id"].as_str().unwrap();
    let second_id = second["job_id"].as_str().unwrap();
    assert_ne!(first_id, second_id);
    assert!(h.scheduler.contains(first_id));
    assert!(h.scheduler.contains(second_id));
    assert_eq!(h.scheduler.len(), 2);

    assert_eq!(
        common::session_status(&h.pool, first_id).as_deref(),
        Some("scheduled")
    );
    assert_eq!(
        common::session_status(&h.pool, second_id).as_deref(),
        Some("scheduled")
    );
}

#[tokio::test]
async fn provider_failure_surfaces_as_500() {
    let h = harness(HarnessOptions {
        telephony_fails: true,
        ..HarnessOptions::default()
    });

    let (status, body) = post_json(
        h.app.clone(),
        "/api/calls/make-call",
        json!({"to": "+15551230000", "message": "hi"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("provider down"));
}

#[tokio::test]
async fn list_and_status_proxy_the_provider() {
    let h = harness(HarnessOptions::default());

    let (status, _content_type, body) = get(h.app.clone(), "/api/calls/list").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["calls"][0]["sid"], FAKE_CALL_SID);

    let (status, _content_type, body) = get(h.app.clone(), "/api/calls/status/CA42").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["call"]["sid"], "CA42");
}

#[tokio::test]
async fn twiml_endpoint_speaks_or_plays() {
    let h = harness(HarnessOptions::default());

    let (status, content_type, body) = get(
        h.app.clone(),
        "/api/calls/twiml?Message=Hello%20from%20dialout",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/xml");
    let xml = String::from_utf8(body).unwrap();
    assert!(xml.contains("Hello from dialout"));
    assert!(xml.contains("<Gather"));
    assert!(xml.contains("handle-speech"));

    let (_status, _content_type, body) = get(
        h.app.clone(),
        "/api/calls/twiml?AudioFile=tts-greeting.mp3",
    )
    .await;
    let xml = String::from_utf8(body).unwrap();
    assert!(xml.contains("<Play>"));
    assert!(xml.contains("tts-greeting.mp3"));
}

#[tokio::test]
async fn audio_endpoint_serves_media_files() {
    let h = harness(HarnessOptions::default());

    // Missing file
    let (status, _content_type, _body) =
        get(h.app.clone(), "/api/calls/audio/tts-missing.mp3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Present file
    std::fs::write(h.media_dir.path().join("tts-abc.mp3"), b"mp3-bytes").unwrap();
    let (status, content_type, body) = get(h.app.clone(), "/api/calls/audio/tts-abc.mp3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "audio/mpeg");
    assert_eq!(body, b"mp3-bytes");
}

#[tokio::test]
async fn audio_endpoint_rejects_path_traversal() {
    let h = harness(HarnessOptions::default());
    std::fs::write(h.media_dir.path().join("tts-abc.mp3"), b"mp3-bytes").unwrap();

    let (status, _content_type, _body) =
        get(h.app.clone(), "/api/calls/audio/..%2F..%2Fetc%2Fpasswd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
