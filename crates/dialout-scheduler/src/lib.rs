//! Deferred-execution facility for the Dialout platform.
//!
//! Two job shapes: single-shot jobs that fire exactly once at a target time
//! (scheduled calls), and daily jobs that fire at a fixed UTC time
//! (housekeeping sweeps). Jobs are identified by a caller-supplied key;
//! re-registering a key aborts and replaces the prior job — an idempotent
//! upsert, not a queue. Jobs are fire-and-forget: a failing job logs and is
//! not retried.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors from job registration.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The requested fire time is not in the future.
    #[error("fire time is not in the future: {0}")]
    PastFireTime(DateTime<Utc>),

    /// The requested daily fire time is not a valid time of day.
    #[error("invalid time of day: {hour:02}:{minute:02}")]
    InvalidTimeOfDay { hour: u32, minute: u32 },
}

/// Keyed registry of deferred jobs on the tokio runtime.
#[derive(Clone, Default)]
pub struct JobScheduler {
    jobs: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single-shot job that fires once at `at` (UTC). If a job
    /// with the same key exists it is aborted and replaced.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::PastFireTime` when `at` is not strictly in
    /// the future.
    pub fn schedule_once<F, Fut>(
        &self,
        key: &str,
        at: DateTime<Utc>,
        job: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let delay = (at - Utc::now())
            .to_std()
            .map_err(|_| SchedulerError::PastFireTime(at))?;

        let jobs = Arc::clone(&self.jobs);
        let job_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!(key = %job_key, "firing scheduled job");
            job().await;
            jobs.lock().expect("scheduler registry poisoned").remove(&job_key);
        });

        self.upsert(key, handle);
        tracing::info!(key, %at, "registered one-shot job");
        Ok(())
    }

    /// Registers a job that fires every day at `hour:minute` UTC. The job
    /// rearms itself after each run. Same replace-on-rekey semantics as
    /// [`Self::schedule_once`].
    pub fn schedule_daily<F, Fut>(
        &self,
        key: &str,
        hour: u32,
        minute: u32,
        job: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidTimeOfDay { hour, minute });
        }

        let job_key = key.to_string();
        let handle = tokio::spawn(async move {
            loop {
                let delay = until_next_daily(Utc::now(), hour, minute);
                tokio::time::sleep(delay).await;
                tracing::info!(key = %job_key, "firing daily job");
                job().await;
            }
        });

        self.upsert(key, handle);
        tracing::info!(key, hour, minute, "registered daily job");
        Ok(())
    }

    /// Cancels a registered job. Returns whether a job was removed.
    pub fn cancel(&self, key: &str) -> bool {
        match self
            .jobs
            .lock()
            .expect("scheduler registry poisoned")
            .remove(key)
        {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a job with this key is currently registered.
    pub fn contains(&self, key: &str) -> bool {
        self.jobs
            .lock()
            .expect("scheduler registry poisoned")
            .contains_key(key)
    }

    /// Number of currently registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.lock().expect("scheduler registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn upsert(&self, key: &str, handle: JoinHandle<()>) {
        let mut jobs = self.jobs.lock().expect("scheduler registry poisoned");
        if let Some(previous) = jobs.insert(key.to_string(), handle) {
            tracing::info!(key, "replacing existing job with the same key");
            previous.abort();
        }
    }
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("jobs", &self.len())
            .finish()
    }
}

/// Time until the next occurrence of `hour:minute` UTC after `now`.
fn until_next_daily(now: DateTime<Utc>, hour: u32, minute: u32) -> std::time::Duration {
    let today = now
        .with_hour(hour)
        .and_then(|t| t.with_minute(minute))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };

    (next - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn one_shot_job_fires_once_and_unregisters() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        scheduler
            .schedule_once("job-1", Utc::now() + ChronoDuration::milliseconds(20), move || {
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        assert!(scheduler.contains("job-1"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.contains("job-1"), "finished job unregisters");
    }

    #[tokio::test]
    async fn past_fire_time_is_rejected() {
        let scheduler = JobScheduler::new();
        let err = scheduler
            .schedule_once("job-2", Utc::now() - ChronoDuration::seconds(1), || async {})
            .unwrap_err();
        assert!(matches!(err, SchedulerError::PastFireTime(_)));
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn rekeying_replaces_the_prior_job() {
        let scheduler = JobScheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&first);
        scheduler
            .schedule_once("call-42", Utc::now() + ChronoDuration::milliseconds(40), move || {
                async move {
                    c1.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let c2 = Arc::clone(&second);
        scheduler
            .schedule_once("call-42", Utc::now() + ChronoDuration::milliseconds(40), move || {
                async move {
                    c2.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0, "replaced job must not fire");
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let scheduler = JobScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        scheduler
            .schedule_once("job-3", Utc::now() + ChronoDuration::milliseconds(40), move || {
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        assert!(scheduler.cancel("job-3"));
        assert!(!scheduler.cancel("job-3"), "second cancel is a no-op");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn daily_delay_rolls_to_tomorrow() {
        let now = Utc::now();
        let past_minute = now - ChronoDuration::minutes(5);
        let delay = until_next_daily(now, past_minute.hour(), past_minute.minute());
        // The slot passed today, so the next fire is ~24h out.
        assert!(delay > Duration::from_secs(23 * 3600));
        assert!(delay <= Duration::from_secs(24 * 3600));
    }

    #[test]
    fn invalid_time_of_day_is_rejected() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let scheduler = JobScheduler::new();
        let err = scheduler.schedule_daily("bad", 24, 0, || async {}).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTimeOfDay { .. }));
    }
}
