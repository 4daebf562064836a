//! Bounded worker pool for node work.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tracing::{error, warn};

/// Failures kept by a pool; older ones are dropped first.
pub const MAX_RECORDED_FAILURES: usize = 256;

struct PoolInner {
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
    idle: Notify,
    failures: Mutex<VecDeque<String>>,
}

impl PoolInner {
    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Keeps the pool busy while held. Work handed between tasks outside the pool
/// (queued advising) holds one so `wait_idle` does not return early.
pub struct InFlightGuard {
    inner: Arc<PoolInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.finish();
    }
}

impl std::fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightGuard").finish()
    }
}

/// Runs submitted futures on the tokio runtime, at most `max_concurrent` at once.
///
/// `submit` never blocks: work waits for a permit inside its own task. Errors
/// returned by submitted work are logged and recorded, never propagated.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    max_concurrent: usize,
}

impl WorkerPool {
    /// Creates a pool allowing `max_concurrent` submissions to run at once.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                failures: Mutex::new(VecDeque::new()),
            }),
            max_concurrent,
        }
    }

    /// Marks one unit of work in flight until the guard drops.
    #[must_use]
    pub fn track(&self) -> InFlightGuard {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            inner: self.inner.clone(),
        }
    }

    /// Spawns `work` and returns immediately.
    pub fn submit<F, E>(&self, name: &str, work: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let guard = self.track();
        let semaphore = self.inner.semaphore.clone();
        let inner = self.inner.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!(task = %name, "Worker pool closed, dropping work");
                return;
            };
            if let Err(e) = work.await {
                error!(task = %name, error = %e, "Node work failed");
                let mut failures = inner.failures.lock();
                if failures.len() == MAX_RECORDED_FAILURES {
                    failures.pop_front();
                }
                failures.push_back(format!("{name}: {e}"));
            }
        });
    }

    /// Waits until no submitted work (including work it submitted) is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Number of submissions not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Configured concurrency.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Error messages of the last [`MAX_RECORDED_FAILURES`] failed submissions, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.inner.failures.lock().iter().cloned().collect()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_concurrent", &self.max_concurrent)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_runs_work() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = counter.clone();
            pool.submit("count", async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        pool.wait_idle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit("bounded", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        pool.wait_idle().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_nested_submissions_are_awaited() {
        let pool = WorkerPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_pool = pool.clone();
        let inner_counter = counter.clone();
        pool.submit("outer", async move {
            let counter = inner_counter.clone();
            inner_pool.submit("inner", async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
            inner_counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        pool.wait_idle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_propagated() {
        let pool = WorkerPool::new(1);
        pool.submit("boom", async { Err::<(), _>("exploded") });
        pool.wait_idle().await;

        assert_eq!(pool.failures(), vec!["boom: exploded".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_log_is_capped() {
        let pool = WorkerPool::new(4);
        for n in 0..MAX_RECORDED_FAILURES + 10 {
            pool.submit("boom", async move { Err::<(), _>(n) });
        }
        pool.wait_idle().await;

        assert_eq!(pool.failures().len(), MAX_RECORDED_FAILURES);
    }

    #[tokio::test]
    async fn test_guard_holds_pool_busy() {
        let pool = WorkerPool::new(1);
        let guard = pool.track();
        assert_eq!(pool.in_flight(), 1);

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
