//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telephony provider settings.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Speech synthesis and transcription settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Media storage settings.
    #[serde(default)]
    pub media: MediaConfig,

    /// Interaction ledger settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Scheduler and housekeeping settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL. Webhook and audio URLs handed to the
    /// telephony provider are built from this, so it must be resolvable
    /// from the provider's network, not just locally.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Maximum number of concurrently running background workers.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum connections in the pool.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dialout_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Telephony provider credentials and origination settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    /// Provider account sid.
    #[serde(default)]
    pub account_sid: String,

    /// Provider auth token.
    #[serde(default)]
    pub auth_token: String,

    /// The number outbound calls originate from.
    #[serde(default)]
    pub from_number: String,

    /// Provider API base URL.
    #[serde(default = "default_telephony_base_url")]
    pub api_base_url: String,
}

/// Speech synthesis and transcription settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// ElevenLabs API key. Absent means synthesis always falls back to the
    /// provider's native spoken-text directive.
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,

    /// OpenAI API key for Whisper transcription. Absent means recording
    /// turns land on the no-transcript reply branch.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Voice profile id used when a call request names none.
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,

    /// How long a recording webhook waits for transcription before replying
    /// without it. Transcription still completes in the background and its
    /// result is appended as a standalone ledger turn.
    #[serde(default = "default_transcribe_deadline_ms")]
    pub transcribe_deadline_ms: u64,
}

/// Media storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory synthesized and archived audio is stored in.
    #[serde(default = "default_media_dir")]
    pub dir: String,
}

/// Interaction ledger settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Path of the JSONL mirror file (the dashboard's degraded read path).
    #[serde(default = "default_mirror_path")]
    pub mirror_path: String,
}

/// Scheduler and housekeeping settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// UTC hour of the daily stale-session sweep.
    #[serde(default)]
    pub sweep_hour: u32,

    /// UTC minute of the daily stale-session sweep.
    #[serde(default)]
    pub sweep_minute: u32,

    /// Sessions idle longer than this many hours are closed by the sweep.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_worker_limit() -> usize {
    8
}

fn default_db_path() -> String {
    "dialout.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_telephony_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_voice_id() -> String {
    "default".to_string()
}

fn default_transcribe_deadline_ms() -> u64 {
    5000
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_mirror_path() -> String {
    "call_interactions.jsonl".to_string()
}

fn default_stale_after_hours() -> u32 {
    24
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            worker_limit: default_worker_limit(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base_url: default_telephony_base_url(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            elevenlabs_api_key: None,
            openai_api_key: None,
            default_voice_id: default_voice_id(),
            transcribe_deadline_ms: default_transcribe_deadline_ms(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mirror_path: default_mirror_path(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_hour: 0,
            sweep_minute: 0,
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DIALOUT_HOST` overrides `server.host`
/// - `DIALOUT_PORT` overrides `server.port`
/// - `DIALOUT_PUBLIC_URL` overrides `server.public_url`
/// - `DIALOUT_DB_PATH` overrides `database.path`
/// - `DIALOUT_LOG_LEVEL` overrides `logging.level`
/// - `DIALOUT_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `DIALOUT_MEDIA_DIR` overrides `media.dir`
/// - `DIALOUT_MIRROR_PATH` overrides `ledger.mirror_path`
/// - `TWILIO_ACCOUNT_SID` overrides `telephony.account_sid`
/// - `TWILIO_AUTH_TOKEN` overrides `telephony.auth_token`
/// - `TWILIO_PHONE_NUMBER` overrides `telephony.from_number`
/// - `ELEVENLABS_API_KEY` overrides `speech.elevenlabs_api_key`
/// - `OPENAI_API_KEY` overrides `speech.openai_api_key`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("DIALOUT_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("DIALOUT_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(url) = std::env::var("DIALOUT_PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Ok(db_path) = std::env::var("DIALOUT_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("DIALOUT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("DIALOUT_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(dir) = std::env::var("DIALOUT_MEDIA_DIR") {
        config.media.dir = dir;
    }
    if let Ok(path) = std::env::var("DIALOUT_MIRROR_PATH") {
        config.ledger.mirror_path = path;
    }
    if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
        config.telephony.account_sid = sid;
    }
    if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
        config.telephony.auth_token = token;
    }
    if let Ok(number) = std::env::var("TWILIO_PHONE_NUMBER") {
        config.telephony.from_number = number;
    }
    if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
        config.speech.elevenlabs_api_key = Some(key);
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.speech.openai_api_key = Some(key);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.public_url, "http://localhost:3000");
        assert_eq!(config.speech.transcribe_deadline_ms, 5000);
        assert_eq!(config.scheduler.stale_after_hours, 24);
        assert!(config.speech.elevenlabs_api_key.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080
public_url = "https://calls.example.com"

[speech]
default_voice_id = "nova"
transcribe_deadline_ms = 2500

[scheduler]
sweep_hour = 3
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.public_url, "https://calls.example.com");
        assert_eq!(config.speech.default_voice_id, "nova");
        assert_eq!(config.speech.transcribe_deadline_ms, 2500);
        assert_eq!(config.scheduler.sweep_hour, 3);
        // Untouched sections keep defaults.
        assert_eq!(config.database.pool_max_size, 8);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/dialout.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml =").unwrap();
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Parse(_))
        ));
    }
}
