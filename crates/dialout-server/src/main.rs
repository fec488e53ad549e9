//! Dialout server binary — the main entry point for the Dialout platform.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, provider client wiring, background housekeeping, and
//! graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use dialout_ledger::{JsonlMirror, Ledger};
use dialout_scheduler::JobScheduler;
use dialout_telephony::{TelephonyClient, TwilioClient, UnconfiguredTelephony};
use dialout_voice::{ElevenLabsSynthesizer, FsMediaStore, MediaStore, WhisperTranscriber};

use dialout_server::workers::WorkerPool;
use dialout_server::{app, background, config, AppState};

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("DIALOUT_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = dialout_db::create_pool(
        &config.database.path,
        dialout_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            dialout_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Wire provider clients. Missing telephony credentials degrade to a
    // stand-in client rather than refusing to boot: webhook and dashboard
    // endpoints stay useful without them.
    let telephony: Arc<dyn TelephonyClient> = match TwilioClient::new(
        &config.telephony.api_base_url,
        &config.telephony.account_sid,
        &config.telephony.auth_token,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!("telephony client not configured, outbound calls will fail: {}", e);
            Arc::new(UnconfiguredTelephony)
        }
    };

    let media_store = Arc::new(FsMediaStore::new(
        &config.media.dir,
        &config.server.public_url,
    ));
    let synthesizer = Arc::new(ElevenLabsSynthesizer::new(
        config.speech.elevenlabs_api_key.clone(),
        Arc::clone(&media_store) as Arc<dyn MediaStore>,
    ));
    let transcriber = Arc::new(WhisperTranscriber::new(config.speech.openai_api_key.clone()));

    let ledger = Ledger::new().with_sink(Arc::new(JsonlMirror::new(&config.ledger.mirror_path)));

    let state = AppState {
        pool,
        ledger,
        telephony,
        synthesizer,
        transcriber,
        media_store,
        http: reqwest::Client::new(),
        scheduler: JobScheduler::new(),
        workers: WorkerPool::new(config.server.worker_limit),
        public_url: config.server.public_url.trim_end_matches('/').to_string(),
        from_number: config.telephony.from_number.clone(),
        default_voice_id: config.speech.default_voice_id.clone(),
        transcribe_deadline: Duration::from_millis(config.speech.transcribe_deadline_ms),
        mirror_path: config.ledger.mirror_path.clone().into(),
    };

    // Register housekeeping before serving so a long-lived instance always
    // has its sweep job.
    background::register_housekeeping(&Arc::new(state.clone()), &config.scheduler)
        .expect("failed to register housekeeping job — check scheduler config");

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, public_url = %config.server.public_url, "starting dialout server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("dialout server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
