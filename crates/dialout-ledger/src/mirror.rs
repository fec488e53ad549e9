//! Best-effort secondary sinks for the interaction ledger.
//!
//! The shipped sink is [`JsonlMirror`], an append-only file of one JSON
//! object per interaction. It exists so a lightweight dashboard can keep
//! showing recent activity when the primary store is unavailable; it is
//! explicitly non-authoritative and is never read back into the database.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dialout_types::CallInteraction;

use crate::error::LedgerError;

/// One line of the mirror log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorEntry {
    /// RFC 3339 UTC timestamp of the append.
    pub timestamp: String,
    /// Provider call sid of the owning session.
    pub call_sid: String,
    /// Interaction kind label (`speech`, `recording`, `transcription`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Transcript-or-speech text, when the turn carried any.
    pub transcript: Option<String>,
    /// Archived audio URL, when the turn carried one.
    pub audio_url: Option<String>,
    /// Recognition or transcription confidence, when reported.
    pub confidence: Option<f64>,
}

impl MirrorEntry {
    /// Builds the mirror line for a stored interaction.
    pub fn from_interaction(call_sid: &str, interaction: &CallInteraction) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            call_sid: call_sid.to_string(),
            kind: interaction.kind.as_str().to_string(),
            transcript: interaction
                .transcription_text
                .clone()
                .or_else(|| interaction.speech_result.clone()),
            audio_url: interaction.archive_url.clone(),
            confidence: interaction
                .speech_confidence
                .or(interaction.transcription_confidence),
        }
    }
}

/// A secondary, best-effort destination for ledger entries.
pub trait LedgerSink {
    /// Records one entry. Failures are the caller's to log; they must never
    /// fail the primary write.
    fn record(&self, entry: &MirrorEntry) -> Result<(), LedgerError>;
}

/// Appends one JSON object per interaction to a local file.
#[derive(Debug, Clone)]
pub struct JsonlMirror {
    path: PathBuf,
}

impl JsonlMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerSink for JsonlMirror {
    fn record(&self, entry: &MirrorEntry) -> Result<(), LedgerError> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Reads the last `limit` mirror entries, most recent first. A missing file
/// yields an empty list; unparseable lines are skipped.
pub fn read_mirror_tail(path: &Path, limit: usize) -> Result<Vec<MirrorEntry>, LedgerError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries: Vec<MirrorEntry> = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::debug!("skipping unparseable mirror line: {}", e);
            }
        }
    }

    let start = entries.len().saturating_sub(limit);
    let mut tail: Vec<MirrorEntry> = entries.split_off(start);
    tail.reverse();
    Ok(tail)
}
