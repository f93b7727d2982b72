//! Query executor: fixed worker pool, single-flight coalescing, timeout and
//! cancellation handling, and cache budget enforcement.
//!
//! Callers block with their own timeout while a pool worker evaluates the
//! query under the concurrency guard's read access. Identical cacheable
//! queries with the same timeout share one backend execution; uncacheable
//! queries always get a fresh, unshared one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::backend::GraphBackend;
use crate::error::{CoreError, QueryError};
use crate::query::cache::{CacheKey, QueryCache};
use crate::query::task::{QueryTask, WaitOutcome};
use crate::query::{QueryKind, QueryOutcome};

pub(crate) struct QueryExecutor {
    backend: Arc<dyn GraphBackend>,
    guard: Arc<RwLock<()>>,
    pool: rayon::ThreadPool,
    cache: Mutex<QueryCache>,
}

impl QueryExecutor {
    pub(crate) fn new(
        backend: Arc<dyn GraphBackend>,
        guard: Arc<RwLock<()>>,
        workers: usize,
        cache_budget_cells: usize,
    ) -> Result<Self, CoreError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("semcore-sparql-{index}"))
            .build()
            .map_err(|e| CoreError::WorkerPool {
                message: e.to_string(),
            })?;
        Ok(Self {
            backend,
            guard,
            pool,
            cache: Mutex::new(QueryCache::new(cache_budget_cells)),
        })
    }

    /// Default pool size: 1.5 × available hardware parallelism + 1.
    pub(crate) fn default_workers() -> usize {
        let parallelism = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(2);
        parallelism * 3 / 2 + 1
    }

    /// Run a normalized query, joining an in-flight computation when possible.
    pub(crate) fn execute(
        &self,
        query: Arc<str>,
        kind: QueryKind,
        cacheable: bool,
        timeout: Duration,
    ) -> Result<QueryOutcome, QueryError> {
        let mut created_key = None;
        let task = if cacheable {
            let key = CacheKey {
                query: Arc::clone(&query),
                timeout,
            };
            let mut cache = self.cache.lock();
            match cache.lookup(&key) {
                Some(existing) => existing,
                None => {
                    let task = Arc::new(QueryTask::new(query, kind, true));
                    cache.insert(key.clone(), Arc::clone(&task));
                    drop(cache);
                    created_key = Some(key);
                    self.spawn(&task);
                    task
                }
            }
        } else {
            let task = Arc::new(QueryTask::new(query, kind, false));
            self.spawn(&task);
            task
        };

        match task.await_result(timeout) {
            WaitOutcome::Ready(outcome) => {
                if let (Some(key), Some(cells)) = (created_key, outcome.cells()) {
                    self.cache.lock().record_cost(&key, cells);
                }
                Ok(outcome)
            }
            WaitOutcome::TimedOut => {
                task.cancel(&self.backend);
                tracing::warn!(kind = %kind, timeout_ms = timeout.as_millis() as u64, "query timed out, cancelling");
                Err(QueryError::Timeout { timeout })
            }
            WaitOutcome::Cancelled => Err(QueryError::Cancelled),
            WaitOutcome::Failed(source) => Err(QueryError::Execution { source }),
            WaitOutcome::Interrupted => {
                tracing::warn!(kind = %kind, "interrupted while awaiting query, returning empty result");
                Ok(QueryOutcome::empty(kind))
            }
        }
    }

    /// Drop every cached entry; called after any non-empty commit.
    pub(crate) fn invalidate(&self) {
        self.cache.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn any_cached_task(&self) -> Option<Arc<QueryTask>> {
        self.cache.lock().any_task()
    }

    #[cfg(test)]
    pub(crate) fn guard(&self) -> &Arc<RwLock<()>> {
        &self.guard
    }

    fn spawn(&self, task: &Arc<QueryTask>) {
        let task = Arc::clone(task);
        let backend = Arc::clone(&self.backend);
        let guard = Arc::clone(&self.guard);
        self.pool.spawn(move || task.run(&backend, &guard));
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}
