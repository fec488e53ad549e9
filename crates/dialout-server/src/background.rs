//! Background housekeeping jobs.

use std::sync::Arc;

use dialout_ledger::sweep_stale_sessions;
use dialout_scheduler::SchedulerError;

use crate::config::SchedulerConfig;
use crate::AppState;

/// Registers the daily stale-session sweep.
///
/// The conversational loop has no built-in turn limit, so a session whose
/// terminal webhook never arrives would stay `in_progress` forever. The
/// sweep closes non-terminal sessions idle for longer than the configured
/// window.
pub fn register_housekeeping(
    state: &Arc<AppState>,
    config: &SchedulerConfig,
) -> Result<(), SchedulerError> {
    let pool = state.pool.clone();
    let stale_after_hours = config.stale_after_hours;

    state.scheduler.schedule_daily(
        "stale-session-sweep",
        config.sweep_hour,
        config.sweep_minute,
        move || {
            let pool = pool.clone();
            async move {
                let result = tokio::task::spawn_blocking(move || {
                    let conn = pool.get().map_err(|e| e.to_string())?;
                    sweep_stale_sessions(&conn, stale_after_hours).map_err(|e| e.to_string())
                })
                .await;

                match result {
                    Ok(Ok(closed)) if closed > 0 => {
                        tracing::info!(closed, "stale session sweep closed sessions");
                    }
                    Ok(Ok(_)) => {
                        tracing::debug!("stale session sweep found nothing to close");
                    }
                    Ok(Err(e)) => tracing::error!("stale session sweep failed: {}", e),
                    Err(e) => tracing::error!("stale session sweep join error: {}", e),
                }
            }
        },
    )
}
