//! Shared test harness: a full router over a real temp-file database with
//! fake provider clients.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use dialout_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use dialout_ledger::{JsonlMirror, Ledger};
use dialout_scheduler::JobScheduler;
use dialout_server::workers::WorkerPool;
use dialout_server::{app, AppState};
use dialout_telephony::{CallCreated, CallRecord, TelephonyClient, TelephonyError};
use dialout_types::VoiceProfile;
use dialout_voice::{FsMediaStore, SpeechSynthesizer, Transcriber};

pub const PUBLIC_URL: &str = "http://localhost:3000";
pub const FROM_NUMBER: &str = "+15550001111";
pub const FAKE_CALL_SID: &str = "CA1234567890abcdef";

/// Recording telephony fake: captures every created call, or fails every
/// request when constructed with `failing()`.
pub struct FakeTelephony {
    fail: bool,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl FakeTelephony {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(to, from, twiml)` triple passed to `create_call`.
    pub fn created(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelephonyClient for FakeTelephony {
    async fn create_call(
        &self,
        to: &str,
        from: &str,
        twiml: &str,
    ) -> Result<CallCreated, TelephonyError> {
        if self.fail {
            return Err(TelephonyError::Api {
                status: 500,
                message: "provider down".to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap()
            .push((to.to_string(), from.to_string(), twiml.to_string()));
        Ok(CallCreated {
            call_sid: FAKE_CALL_SID.to_string(),
            status: "queued".to_string(),
            to: to.to_string(),
            from: from.to_string(),
        })
    }

    async fn fetch_call(&self, call_sid: &str) -> Result<CallRecord, TelephonyError> {
        if self.fail {
            return Err(TelephonyError::Api {
                status: 500,
                message: "provider down".to_string(),
            });
        }
        Ok(CallRecord {
            sid: call_sid.to_string(),
            status: "in-progress".to_string(),
            duration: Some("12".to_string()),
            start_time: None,
            end_time: None,
            to: Some("+15551230000".to_string()),
            from: Some(FROM_NUMBER.to_string()),
        })
    }

    async fn list_calls(&self, _limit: usize) -> Result<Vec<CallRecord>, TelephonyError> {
        if self.fail {
            return Err(TelephonyError::Api {
                status: 500,
                message: "provider down".to_string(),
            });
        }
        Ok(vec![CallRecord {
            sid: FAKE_CALL_SID.to_string(),
            status: "completed".to_string(),
            duration: Some("34".to_string()),
            start_time: None,
            end_time: None,
            to: Some("+15551230000".to_string()),
            from: Some(FROM_NUMBER.to_string()),
        }])
    }
}

/// Synthesizer fake: always returns the configured URL (or `None`).
pub struct FakeSynthesizer(pub Option<String>);

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str, _profile: &VoiceProfile) -> Option<String> {
        self.0.clone()
    }
}

/// Transcriber fake: always returns the configured transcript (or `None`).
pub struct FakeTranscriber(pub Option<String>);

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _recording_url: &str) -> Option<String> {
        self.0.clone()
    }
}

/// Knobs for building a harness.
pub struct HarnessOptions {
    pub telephony_fails: bool,
    pub synth_url: Option<String>,
    pub transcript: Option<String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            telephony_fails: false,
            synth_url: Some(format!("{PUBLIC_URL}/api/calls/audio/tts-test.mp3")),
            transcript: Some("hello there".to_string()),
        }
    }
}

/// A router plus the handles tests assert against.
pub struct Harness {
    pub app: Router,
    pub pool: DbPool,
    pub scheduler: JobScheduler,
    pub telephony: Arc<FakeTelephony>,
    pub media_dir: tempfile::TempDir,
    pub mirror_path: PathBuf,
    _db_dir: tempfile::TempDir,
}

/// Builds a full application over a temp-file database. A file-backed
/// database (not `:memory:`) because pooled in-memory connections each see
/// their own empty database.
pub fn harness(options: HarnessOptions) -> Harness {
    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("dialout.db");
    let pool = create_pool(
        db_path.to_str().unwrap(),
        DbRuntimeSettings {
            busy_timeout_ms: 5000,
            pool_max_size: 4,
        },
    )
    .unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
    }

    let media_dir = tempfile::tempdir().unwrap();
    let mirror_path = db_dir.path().join("mirror.jsonl");
    let telephony = Arc::new(if options.telephony_fails {
        FakeTelephony::failing()
    } else {
        FakeTelephony::new()
    });
    let scheduler = JobScheduler::new();

    let state = AppState {
        pool: pool.clone(),
        ledger: Ledger::new().with_sink(Arc::new(JsonlMirror::new(&mirror_path))),
        telephony: Arc::clone(&telephony) as Arc<dyn TelephonyClient>,
        synthesizer: Arc::new(FakeSynthesizer(options.synth_url)),
        transcriber: Arc::new(FakeTranscriber(options.transcript)),
        media_store: Arc::new(FsMediaStore::new(media_dir.path(), PUBLIC_URL)),
        http: reqwest::Client::new(),
        scheduler: scheduler.clone(),
        workers: WorkerPool::new(4),
        public_url: PUBLIC_URL.to_string(),
        from_number: FROM_NUMBER.to_string(),
        default_voice_id: "default".to_string(),
        transcribe_deadline: Duration::from_millis(1000),
        mirror_path: mirror_path.clone(),
    };

    Harness {
        app: app(state),
        pool,
        scheduler,
        telephony,
        media_dir,
        mirror_path,
        _db_dir: db_dir,
    }
}

/// POSTs a JSON body and returns the status with the parsed response body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// POSTs a urlencoded form and returns the status, content type, and body.
pub async fn post_form(app: Router, uri: &str, form: &str) -> (StatusCode, String, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap_or_default().to_string())
        .unwrap_or_default();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
}

/// GETs a URI and returns the status, content type, and raw body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, String, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap_or_default().to_string())
        .unwrap_or_default();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, bytes.to_vec())
}

/// Reads one session row's status by call sid straight from the database.
pub fn session_status(pool: &DbPool, call_sid: &str) -> Option<String> {
    let conn = pool.get().unwrap();
    conn.query_row(
        "SELECT status FROM call_sessions WHERE call_sid = ?1",
        [call_sid],
        |row| row.get(0),
    )
    .ok()
}

/// Counts interactions for a session by call sid.
pub fn interaction_count(pool: &DbPool, call_sid: &str) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM call_interactions
         WHERE call_session_id = (SELECT id FROM call_sessions WHERE call_sid = ?1)",
        [call_sid],
        |row| row.get(0),
    )
    .unwrap_or(0)
}
