use crate::model::CallContext;
use crate::store::error::{GraphError, GraphResult};
use itertools::Itertools;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Merged result of one scheduler run
#[derive(Debug)]
pub struct BatchOutcome<K, V> {
    /// Partial results of the successful chunks, merged (last write wins)
    pub results: HashMap<K, V>,
    /// Every chunk error, in completion order
    pub errors: Vec<GraphError>,
    /// Number of chunks the input was split into
    pub batches: usize,
}

impl<K, V> Default for BatchOutcome<K, V> {
    fn default() -> Self {
        Self {
            results: HashMap::new(),
            errors: Vec::new(),
            batches: 0,
        }
    }
}

impl<K, V> BatchOutcome<K, V> {
    /// Surface the first chunk error, if any. The remaining errors are only logged.
    pub fn into_result(mut self, ctx: &CallContext, phase: &str) -> GraphResult<HashMap<K, V>> {
        if self.errors.is_empty() {
            return Ok(self.results);
        }
        if self.errors.len() > 1 {
            warn!(
                "[{}] {}: {} of {} batches failed, reporting the first",
                ctx.request_id,
                phase,
                self.errors.len(),
                self.batches
            );
        }
        Err(self.errors.swap_remove(0))
    }
}

struct SharedState<T, K, V> {
    pending: std::vec::IntoIter<Vec<T>>,
    outcome: BatchOutcome<K, V>,
}

/// Splits a keyed collection into bounded chunks and runs one async operation
/// per chunk on a bounded pool of workers.
///
/// Workers are stateless and pull the next chunk until none remain, so at most
/// `max_workers` chunk operations are ever in flight. A failing chunk does not
/// stop its siblings. There is no retry at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    batch_size: usize,
    max_workers: usize,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, max_workers: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_workers: max_workers.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Same worker limit, different chunk size
    pub fn with_batch_size(&self, batch_size: usize) -> Self {
        Self::new(batch_size, self.max_workers)
    }

    /// Run `op` over `items` in chunks of at most `batch_size`.
    ///
    /// An empty input returns an empty outcome without invoking `op`. Once the
    /// context deadline has passed, chunks not yet dispatched are recorded as
    /// [`GraphError::DeadlineExceeded`] instead of being run.
    pub async fn run<T, K, V, F, Fut>(
        &self,
        ctx: &CallContext,
        items: impl IntoIterator<Item = T>,
        op: F,
    ) -> BatchOutcome<K, V>
    where
        T: Send + 'static,
        K: Eq + Hash + Send + 'static,
        V: Send + 'static,
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GraphResult<HashMap<K, V>>> + Send + 'static,
    {
        let chunks: Vec<Vec<T>> = {
            let grouped = items.into_iter().chunks(self.batch_size);
            let collected = grouped.into_iter().map(|chunk| chunk.collect()).collect();
            collected
        };

        let batches = chunks.len();
        if batches == 0 {
            return BatchOutcome::default();
        }

        let workers = self.max_workers.min(batches);
        debug!(
            "[{}] dispatching {} batches (batch_size={}, workers={})",
            ctx.request_id, batches, self.batch_size, workers
        );

        let shared = Arc::new(Mutex::new(SharedState {
            pending: chunks.into_iter(),
            outcome: BatchOutcome {
                batches,
                ..BatchOutcome::default()
            },
        }));
        let op = Arc::new(op);

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let shared = Arc::clone(&shared);
            let op = Arc::clone(&op);
            let ctx = ctx.clone();
            pool.spawn(async move {
                loop {
                    let next = shared.lock().pending.next();
                    let Some(chunk) = next else {
                        break;
                    };

                    if ctx.is_expired() {
                        shared.lock().outcome.errors.push(GraphError::DeadlineExceeded);
                        continue;
                    }

                    match op(chunk).await {
                        Ok(partial) => shared.lock().outcome.results.extend(partial),
                        Err(err) => {
                            debug!("[{}] batch failed: {}", ctx.request_id, err);
                            shared.lock().outcome.errors.push(err);
                        }
                    }
                }
            });
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(join_err) = joined {
                shared
                    .lock()
                    .outcome
                    .errors
                    .push(GraphError::Backend(format!("batch worker aborted: {}", join_err)));
            }
        }

        let outcome = match Arc::try_unwrap(shared) {
            Ok(state) => state.into_inner().outcome,
            Err(shared) => std::mem::take(&mut shared.lock().outcome),
        };
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn codes(n: usize) -> HashMap<String, String> {
        (0..n)
            .map(|i| (format!("id-{}", i), format!("code-{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_invocations() {
        let scheduler = BatchScheduler::new(10, 4);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let outcome = scheduler
            .run(&CallContext::new(), HashMap::<String, String>::new(), move |_chunk| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(HashMap::<String, String>::new()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.batches, 0);
        assert!(outcome.results.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_count_and_merge() {
        let scheduler = BatchScheduler::new(3, 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let outcome = scheduler
            .run(&CallContext::new(), codes(10), move |chunk: Vec<(String, String)>| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert!(chunk.len() <= 3);
                async move { Ok(chunk.into_iter().collect::<HashMap<_, _>>()) }
            })
            .await;

        // ceil(10 / 3)
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.batches, 4);
        assert_eq!(outcome.results, codes(10));
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_worker_limit() {
        let scheduler = BatchScheduler::new(1, 3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (current, max_seen) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let outcome = scheduler
            .run(&CallContext::new(), 0..20, move |_chunk: Vec<i32>| {
                let current = Arc::clone(&current);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(HashMap::<i32, ()>::new())
                }
            })
            .await;

        assert_eq!(outcome.batches, 20);
        assert!(outcome.errors.is_empty());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_errors_are_collected_without_cancelling_siblings() {
        let scheduler = BatchScheduler::new(1, 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let outcome = scheduler
            .run(&CallContext::new(), 0..6, move |chunk: Vec<i32>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    let value = chunk[0];
                    if value % 2 == 0 {
                        Err(GraphError::Backend(format!("bad chunk {}", value)))
                    } else {
                        Ok(HashMap::from([(value, ())]))
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(outcome.errors.len(), 3);
        assert_eq!(outcome.results.len(), 3);

        let result = outcome.into_result(&CallContext::new(), "test");
        assert!(matches!(result, Err(GraphError::Backend(_))));
    }

    #[tokio::test]
    async fn test_expired_context_skips_dispatch() {
        let scheduler = BatchScheduler::new(2, 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let ctx = CallContext::with_timeout(Duration::from_millis(0));

        let outcome = scheduler
            .run(&ctx, 0..4, move |_chunk: Vec<i32>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(HashMap::<i32, ()>::new()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome
            .errors
            .iter()
            .all(|e| matches!(e, GraphError::DeadlineExceeded)));
    }

    #[test]
    fn test_sizes_are_clamped() {
        let scheduler = BatchScheduler::new(0, 0);
        assert_eq!(scheduler.batch_size(), 1);
        assert_eq!(scheduler.max_workers(), 1);
        assert_eq!(scheduler.with_batch_size(25).max_workers(), 1);
    }
}
