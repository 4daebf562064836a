//! Completion notification: joins waiters with the work they wait on.
//!
//! A waiter registers a set of notify ids with a callback; the callback runs
//! exactly once, after every id has been signalled through `done_with`. Ids
//! may be signalled before the waiter registers. Such early signals are kept
//! up to a capacity, oldest evicted first.

use crate::errors::EngineError;
use crate::execution::{ResponseData, ResponseMap};
use crate::services::{NotifyCallback, WaitNotifyEngine};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Early signals kept by default before the oldest is evicted.
pub const DEFAULT_ORPHAN_CAPACITY: usize = 10_000;

struct Waiter {
    notify_ids: Vec<String>,
    callback: Arc<dyn NotifyCallback>,
}

#[derive(Default)]
struct JoinState {
    done: HashMap<String, ResponseData>,
    waiters: Vec<Waiter>,
    /// Signalled ids no waiter references yet, oldest first.
    orphans: VecDeque<String>,
}

impl JoinState {
    fn is_awaited(&self, notify_id: &str) -> bool {
        self.waiters
            .iter()
            .any(|w| w.notify_ids.iter().any(|id| id == notify_id))
    }

    /// Drops the oldest unclaimed signals beyond `capacity`, returning how many went.
    fn evict_orphans(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.orphans.len() > capacity {
            if let Some(id) = self.orphans.pop_front() {
                self.done.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Removes every waiter whose ids are all done, with its responses.
    fn take_ready(&mut self) -> Vec<(Arc<dyn NotifyCallback>, ResponseMap)> {
        let mut ready = Vec::new();
        let mut index = 0;
        while index < self.waiters.len() {
            let complete = self.waiters[index]
                .notify_ids
                .iter()
                .all(|id| self.done.contains_key(id));
            if complete {
                let waiter = self.waiters.swap_remove(index);
                let responses: ResponseMap = waiter
                    .notify_ids
                    .iter()
                    .filter_map(|id| self.done.remove(id).map(|data| (id.clone(), data)))
                    .collect();
                ready.push((waiter.callback, responses));
            } else {
                index += 1;
            }
        }
        ready
    }
}

/// A [`WaitNotifyEngine`] running callbacks in-process.
pub struct InMemoryWaitNotifyEngine {
    state: Mutex<JoinState>,
    orphan_capacity: usize,
}

impl Default for InMemoryWaitNotifyEngine {
    fn default() -> Self {
        Self::with_orphan_capacity(DEFAULT_ORPHAN_CAPACITY)
    }
}

impl InMemoryWaitNotifyEngine {
    /// Creates an engine with no waiters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine keeping at most `capacity` signals nobody waits on yet.
    #[must_use]
    pub fn with_orphan_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(JoinState::default()),
            orphan_capacity: capacity,
        }
    }

    /// Number of signals no waiter has claimed.
    #[must_use]
    pub fn pending_signals(&self) -> usize {
        self.state.lock().orphans.len()
    }

    /// Number of waiters still blocked.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    async fn fire(ready: Vec<(Arc<dyn NotifyCallback>, ResponseMap)>) {
        join_all(
            ready
                .into_iter()
                .map(|(callback, responses)| async move { callback.notify(responses).await }),
        )
        .await;
    }
}

impl std::fmt::Debug for InMemoryWaitNotifyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryWaitNotifyEngine")
            .field("done", &state.done.len())
            .field("waiters", &state.waiters.len())
            .field("orphan_capacity", &self.orphan_capacity)
            .finish()
    }
}

#[async_trait]
impl WaitNotifyEngine for InMemoryWaitNotifyEngine {
    async fn done_with(&self, notify_id: &str, data: ResponseData) -> Result<(), EngineError> {
        let (ready, evicted) = {
            let mut state = self.state.lock();
            state.done.insert(notify_id.to_string(), data);
            let ready = state.take_ready();
            let mut evicted = 0;
            if state.done.contains_key(notify_id)
                && !state.is_awaited(notify_id)
                && !state.orphans.iter().any(|id| id == notify_id)
            {
                state.orphans.push_back(notify_id.to_string());
                evicted = state.evict_orphans(self.orphan_capacity);
            }
            (ready, evicted)
        };
        if evicted > 0 {
            warn!(evicted, "Dropped signals nobody waited for");
        }
        debug!(notify_id = %notify_id, released = ready.len(), "Notify id done");
        Self::fire(ready).await;
        Ok(())
    }

    async fn wait_for(
        &self,
        notify_ids: Vec<String>,
        callback: Arc<dyn NotifyCallback>,
    ) -> Result<(), EngineError> {
        let ready = {
            let mut state = self.state.lock();
            state.orphans.retain(|id| !notify_ids.contains(id));
            state.waiters.push(Waiter { notify_ids, callback });
            state.take_ready()
        };
        Self::fire(ready).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        calls: Mutex<Vec<ResponseMap>>,
    }

    #[async_trait]
    impl NotifyCallback for Capture {
        async fn notify(&self, responses: ResponseMap) {
            self.calls.lock().push(responses);
        }
    }

    fn task(n: i64) -> ResponseData {
        ResponseData::Task {
            payload: serde_json::json!(n),
        }
    }

    #[tokio::test]
    async fn test_join_fires_once_all_ids_done() {
        let engine = InMemoryWaitNotifyEngine::new();
        let capture = Arc::new(Capture::default());
        engine
            .wait_for(vec!["a".into(), "b".into()], capture.clone())
            .await
            .unwrap();

        engine.done_with("a", task(1)).await.unwrap();
        assert!(capture.calls.lock().is_empty());

        engine.done_with("b", task(2)).await.unwrap();
        let calls = capture.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0].get("a"), Some(&task(1)));
        drop(calls);
        assert_eq!(engine.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn test_done_before_wait_fires_on_register() {
        let engine = InMemoryWaitNotifyEngine::new();
        let capture = Arc::new(Capture::default());

        engine.done_with("a", task(1)).await.unwrap();
        engine.wait_for(vec!["a".into()], capture.clone()).await.unwrap();

        assert_eq!(capture.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unclaimed_signals_are_evicted_oldest_first() {
        let engine = InMemoryWaitNotifyEngine::with_orphan_capacity(2);
        for id in ["a", "b", "c"] {
            engine.done_with(id, task(1)).await.unwrap();
        }
        assert_eq!(engine.pending_signals(), 2);

        let evicted = Arc::new(Capture::default());
        engine.wait_for(vec!["a".into()], evicted.clone()).await.unwrap();
        assert!(evicted.calls.lock().is_empty());

        let kept = Arc::new(Capture::default());
        engine.wait_for(vec!["c".into()], kept.clone()).await.unwrap();
        assert_eq!(kept.calls.lock().len(), 1);
        assert_eq!(engine.pending_signals(), 1);
    }

    #[tokio::test]
    async fn test_independent_waiters() {
        let engine = InMemoryWaitNotifyEngine::new();
        let first = Arc::new(Capture::default());
        let second = Arc::new(Capture::default());
        engine.wait_for(vec!["a".into()], first.clone()).await.unwrap();
        engine.wait_for(vec!["b".into()], second.clone()).await.unwrap();

        engine.done_with("b", task(2)).await.unwrap();

        assert!(first.calls.lock().is_empty());
        assert_eq!(second.calls.lock().len(), 1);
        assert_eq!(engine.pending_waiters(), 1);
    }
}
