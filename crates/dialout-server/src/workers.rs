//! Bounded background worker pool.
//!
//! Webhook handlers hand slow work (recording downloads, transcription) to
//! this pool so the provider's response deadline is never spent waiting on
//! a speech provider. Concurrency is capped by a semaphore; when the pool
//! is saturated new work queues on the permit instead of piling up as
//! unbounded tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};

/// A semaphore-bounded pool of fire-and-forget tasks on the tokio runtime.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Spawns a fire-and-forget task. The task waits for a pool permit
    /// before running.
    pub fn spawn<F>(&self, label: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                // Closed only at shutdown; dropping the work is fine then.
                Err(_) => return,
            };
            tracing::debug!(label, "worker task running");
            work.await;
        });
    }

    /// Runs `work` on the pool and waits up to `deadline` for its result.
    ///
    /// Returns `Some(value)` when the work finishes in time. On deadline
    /// expiry returns `None` immediately; the work keeps running and its
    /// eventual result is handed to `on_late` instead of being dropped.
    pub async fn run_with_deadline<T, F, C, CFut>(
        &self,
        label: &'static str,
        deadline: Duration,
        work: F,
        on_late: C,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
        C: FnOnce(T) -> CFut + Send + 'static,
        CFut: Future<Output = ()> + Send,
    {
        let (tx, rx) = oneshot::channel();
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let value = work.await;
            // The receiver is dropped once the deadline passes, so a failed
            // send IS the late path.
            if let Err(value) = tx.send(value) {
                tracing::info!(label, "work finished after deadline, running late handler");
                on_late(value).await;
            }
        });

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::info!(label, deadline_ms = deadline.as_millis() as u64, "deadline expired");
                None
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fast_work_returns_its_value() {
        let pool = WorkerPool::new(2);
        let result = pool
            .run_with_deadline(
                "fast",
                Duration::from_millis(500),
                async { 41 + 1 },
                |_late| async {},
            )
            .await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn slow_work_lands_on_the_late_handler() {
        let pool = WorkerPool::new(2);
        let late = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&late);
        let result = pool
            .run_with_deadline(
                "slow",
                Duration::from_millis(20),
                async {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    7
                },
                move |value| async move {
                    counter.fetch_add(value, Ordering::SeqCst);
                },
            )
            .await;
        assert_eq!(result, None, "deadline expired");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(late.load(Ordering::SeqCst), 7, "late handler got the value");
    }

    #[tokio::test]
    async fn pool_caps_concurrency() {
        let pool = WorkerPool::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.spawn("cap", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
