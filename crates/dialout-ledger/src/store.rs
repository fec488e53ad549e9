//! Persistence operations for call sessions and the interaction ledger.
//!
//! All interaction writes go through [`Ledger::append`], which assigns the
//! next per-session sequence number and inserts in a single statement. The
//! subquery computes `COALESCE(MAX(sequence_number), 0) + 1` within the same
//! INSERT, eliminating the read-modify-write race where two concurrent
//! writers observe the same count and produce duplicate sequence numbers.
//! The `UNIQUE (call_session_id, sequence_number)` constraint backs this up
//! at the schema level.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use uuid::Uuid;

use dialout_types::{CallInteraction, CallSession, CallStatus, NewInteraction};

use crate::error::LedgerError;
use crate::mirror::{LedgerSink, MirrorEntry};

/// Payload for creating a call session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub call_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub status: Option<CallStatus>,
    pub initial_message: Option<String>,
    pub voice_id: Option<String>,
}

/// A session together with its ordered interactions, as served to the
/// dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecentSession {
    #[serde(flatten)]
    pub session: CallSession,
    pub interactions: Vec<CallInteraction>,
}

/// The ledger-write interface: one required primary store (SQLite) plus any
/// number of best-effort secondary sinks.
#[derive(Clone, Default)]
pub struct Ledger {
    sinks: Vec<Arc<dyn LedgerSink + Send + Sync>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Registers a secondary sink. Sinks are invoked after every successful
    /// primary write; their failures are logged and swallowed.
    pub fn with_sink(mut self, sink: Arc<dyn LedgerSink + Send + Sync>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Appends one interaction to the session's ledger and returns the
    /// stored row, including its assigned sequence number.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Database` on SQL failure (including a foreign
    /// key violation for an unknown session). Sink failures never surface.
    pub fn append(
        &self,
        conn: &Connection,
        session: &CallSession,
        interaction: &NewInteraction,
    ) -> Result<CallInteraction, LedgerError> {
        let id = Uuid::new_v4().to_string();
        let kind = interaction.kind();

        // Atomically assign the sequence number and insert in one statement.
        let (seq, created_at) = conn.query_row(
            "INSERT INTO call_interactions (
                id, call_session_id, interaction_type, sequence_number,
                speech_result, speech_confidence,
                recording_sid, recording_url, recording_duration, archive_url,
                transcription_text, transcription_source, transcription_confidence,
                response_text, response_audio_url, processing_time_ms, error_message
             )
             VALUES (
                ?1, ?2, ?3,
                (SELECT COALESCE(MAX(sequence_number), 0) + 1
                   FROM call_interactions WHERE call_session_id = ?2),
                ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16
             )
             RETURNING sequence_number, created_at",
            params![
                id,
                session.id,
                kind.as_str(),
                interaction.speech_result,
                interaction.speech_confidence,
                interaction.recording_sid,
                interaction.recording_url,
                interaction.recording_duration,
                interaction.archive_url,
                interaction.transcription_text,
                interaction.transcription_source.map(|s| s.as_str()),
                interaction.transcription_confidence,
                interaction.response_text,
                interaction.response_audio_url,
                interaction.processing_time_ms,
                interaction.error_message,
            ],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )?;

        let stored = CallInteraction {
            id,
            call_session_id: session.id.clone(),
            kind,
            sequence_number: seq,
            speech_result: interaction.speech_result.clone(),
            speech_confidence: interaction.speech_confidence,
            recording_sid: interaction.recording_sid.clone(),
            recording_url: interaction.recording_url.clone(),
            recording_duration: interaction.recording_duration,
            archive_url: interaction.archive_url.clone(),
            transcription_text: interaction.transcription_text.clone(),
            transcription_source: interaction.transcription_source,
            transcription_confidence: interaction.transcription_confidence,
            response_text: interaction.response_text.clone(),
            response_audio_url: interaction.response_audio_url.clone(),
            processing_time_ms: interaction.processing_time_ms,
            error_message: interaction.error_message.clone(),
            created_at,
        };

        let entry = MirrorEntry::from_interaction(&session.call_sid, &stored);
        for sink in &self.sinks {
            if let Err(e) = sink.record(&entry) {
                tracing::warn!(
                    call_sid = %session.call_sid,
                    seq = stored.sequence_number,
                    "ledger sink write failed (non-fatal): {}",
                    e
                );
            }
        }

        Ok(stored)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Creates a call session. `status` defaults to `initiated`.
///
/// # Errors
///
/// Returns `LedgerError::Database` on SQL failure, including a unique
/// constraint violation when the call sid already exists.
pub fn create_session(conn: &Connection, new: &NewSession) -> Result<CallSession, LedgerError> {
    let id = Uuid::new_v4().to_string();
    let status = new.status.unwrap_or(CallStatus::Initiated);

    conn.execute(
        "INSERT INTO call_sessions
            (id, call_sid, from_number, to_number, status, initial_message, voice_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            new.call_sid,
            new.from_number,
            new.to_number,
            status.as_str(),
            new.initial_message,
            new.voice_id,
        ],
    )?;

    get_session(conn, &id)
}

/// Fetches a session by internal id.
pub fn get_session(conn: &Connection, id: &str) -> Result<CallSession, LedgerError> {
    conn.query_row(
        &format!("{SESSION_SELECT} WHERE id = ?1"),
        params![id],
        read_session,
    )
    .optional()?
    .ok_or_else(|| LedgerError::SessionNotFound(id.to_string()))
}

/// Fetches a session by provider call sid.
pub fn find_session_by_call_sid(
    conn: &Connection,
    call_sid: &str,
) -> Result<Option<CallSession>, LedgerError> {
    Ok(conn
        .query_row(
            &format!("{SESSION_SELECT} WHERE call_sid = ?1"),
            params![call_sid],
            read_session,
        )
        .optional()?)
}

/// Looks up the session for a provider call sid, creating an `in_progress`
/// one if no session exists yet (self-healing bootstrap: webhooks may
/// reference calls this instance never placed, e.g. after a restart).
///
/// Uses `INSERT OR IGNORE` followed by a lookup so two concurrent webhooks
/// for the same unknown call sid converge on a single row.
pub fn bootstrap_session(conn: &Connection, call_sid: &str) -> Result<CallSession, LedgerError> {
    conn.execute(
        "INSERT OR IGNORE INTO call_sessions (id, call_sid, from_number, to_number, status)
         VALUES (?1, ?2, '', '', ?3)",
        params![
            Uuid::new_v4().to_string(),
            call_sid,
            CallStatus::InProgress.as_str()
        ],
    )?;

    find_session_by_call_sid(conn, call_sid)?
        .ok_or_else(|| LedgerError::SessionNotFound(call_sid.to_string()))
}

/// Advances a session's status, enforcing forward-only transitions. Returns
/// `true` when the row changed; a transition to an equal or earlier rank is
/// a silent no-op.
pub fn advance_status(
    conn: &Connection,
    session_id: &str,
    status: CallStatus,
) -> Result<bool, LedgerError> {
    // Collect the statuses ranked strictly below the target so the guard is
    // expressed in the UPDATE itself and stays atomic.
    let lower: Vec<&str> = [
        CallStatus::Scheduled,
        CallStatus::Initiated,
        CallStatus::Ringing,
        CallStatus::InProgress,
        CallStatus::Completed,
        CallStatus::Failed,
        CallStatus::NoAnswer,
        CallStatus::Busy,
    ]
    .iter()
    .filter(|s| s.rank() < status.rank())
    .map(|s| s.as_str())
    .collect();

    if lower.is_empty() {
        return Ok(false);
    }

    let placeholders: Vec<String> = (3..3 + lower.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "UPDATE call_sessions
         SET status = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND status IN ({})",
        placeholders.join(", ")
    );

    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(status.as_str().to_string()), Box::new(session_id.to_string())];
    for s in lower {
        values.push(Box::new(s.to_string()));
    }
    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| &**v).collect();

    let changed = conn.execute(&sql, refs.as_slice())?;
    Ok(changed > 0)
}

/// Attaches the real provider call sid to a pre-created `scheduled` session
/// and moves it to `initiated`. The placeholder sid a scheduled session is
/// created with is not a provider id, so replacing it here does not violate
/// call-sid immutability. Returns `false` when the session is no longer in
/// the `scheduled` state.
pub fn activate_scheduled_session(
    conn: &Connection,
    session_id: &str,
    call_sid: &str,
) -> Result<bool, LedgerError> {
    let changed = conn.execute(
        "UPDATE call_sessions
         SET call_sid = ?1, status = 'initiated', updated_at = datetime('now')
         WHERE id = ?2 AND status = 'scheduled'",
        params![call_sid, session_id],
    )?;
    Ok(changed > 0)
}

/// Returns the most recently created sessions (newest first), each with its
/// interactions in ascending sequence order.
pub fn recent_sessions(conn: &Connection, limit: i64) -> Result<Vec<RecentSession>, LedgerError> {
    let mut stmt = conn.prepare(&format!(
        "{SESSION_SELECT} ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))?;
    let sessions: Vec<CallSession> = stmt
        .query_map(params![limit], read_session)?
        .collect::<Result<_, _>>()?;

    let mut interaction_stmt = conn.prepare(
        "SELECT id, call_session_id, interaction_type, sequence_number,
                speech_result, speech_confidence,
                recording_sid, recording_url, recording_duration, archive_url,
                transcription_text, transcription_source, transcription_confidence,
                response_text, response_audio_url, processing_time_ms, error_message,
                created_at
         FROM call_interactions
         WHERE call_session_id = ?1
         ORDER BY sequence_number ASC",
    )?;

    let mut result = Vec::with_capacity(sessions.len());
    for session in sessions {
        let interactions: Vec<CallInteraction> = interaction_stmt
            .query_map(params![session.id], read_interaction)?
            .collect::<Result<_, _>>()?;
        result.push(RecentSession {
            session,
            interactions,
        });
    }

    Ok(result)
}

/// Closes non-terminal sessions idle for longer than `idle_hours`. Active
/// sessions are marked completed; `scheduled` sessions whose job never
/// fired (jobs live in memory and do not survive a restart) are marked
/// failed. Returns the number of sessions closed. This is the safety
/// backstop for the conversational loop, which has no built-in turn limit.
pub fn sweep_stale_sessions(conn: &Connection, idle_hours: u32) -> Result<usize, LedgerError> {
    let cutoff = format!("-{idle_hours} hours");
    let completed = conn.execute(
        "UPDATE call_sessions
         SET status = 'completed', updated_at = datetime('now')
         WHERE status IN ('initiated', 'ringing', 'in_progress')
           AND updated_at < datetime('now', ?1)",
        params![cutoff],
    )?;
    let failed = conn.execute(
        "UPDATE call_sessions
         SET status = 'failed', updated_at = datetime('now')
         WHERE status = 'scheduled'
           AND updated_at < datetime('now', ?1)",
        params![cutoff],
    )?;
    Ok(completed + failed)
}

const SESSION_SELECT: &str = "SELECT id, call_sid, from_number, to_number, status, duration_secs,
        start_time, end_time, initial_message, voice_id, created_at, updated_at
 FROM call_sessions";

fn read_session(row: &Row<'_>) -> rusqlite::Result<CallSession> {
    let status_str: String = row.get(4)?;
    let status = status_str.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown call status: {status_str}").into(),
        )
    })?;

    Ok(CallSession {
        id: row.get(0)?,
        call_sid: row.get(1)?,
        from_number: row.get(2)?,
        to_number: row.get(3)?,
        status,
        duration_secs: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        initial_message: row.get(8)?,
        voice_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn read_interaction(row: &Row<'_>) -> rusqlite::Result<CallInteraction> {
    let kind_str: String = row.get(2)?;
    let kind = kind_str.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown interaction kind: {kind_str}").into(),
        )
    })?;

    let source: Option<String> = row.get(11)?;
    let transcription_source = match source.as_deref() {
        Some("primary") => Some(dialout_types::TranscriptSource::Primary),
        Some("secondary") => Some(dialout_types::TranscriptSource::Secondary),
        _ => None,
    };

    Ok(CallInteraction {
        id: row.get(0)?,
        call_session_id: row.get(1)?,
        kind,
        sequence_number: row.get(3)?,
        speech_result: row.get(4)?,
        speech_confidence: row.get(5)?,
        recording_sid: row.get(6)?,
        recording_url: row.get(7)?,
        recording_duration: row.get(8)?,
        archive_url: row.get(9)?,
        transcription_text: row.get(10)?,
        transcription_source,
        transcription_confidence: row.get(12)?,
        response_text: row.get(13)?,
        response_audio_url: row.get(14)?,
        processing_time_ms: row.get(15)?,
        error_message: row.get(16)?,
        created_at: row.get(17)?,
    })
}
