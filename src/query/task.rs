//! Shared cancellable query task.
//!
//! One task represents one backend execution. Cacheable tasks are registered
//! in the result cache before they complete, so every concurrent caller of
//! the same normalized query text joins the same task (single-flight).
//! Callers block on [`QueryTask::await_result`] with their own timeout; the
//! worker drives [`QueryTask::run`] on the pool.
//!
//! Task state uses a std `Mutex` deliberately: a worker panic poisons the
//! state, and an awaiting caller resolves that into the canonical empty
//! result rather than an error (see [`WaitOutcome::Interrupted`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::backend::GraphBackend;
use crate::error::BackendError;
use crate::query::{QueryKind, QueryOutcome, SelectResult, ConstructResult, SelectSnapshot};
use crate::statement::Statement;

/// Lifecycle of a query computation.
#[derive(Debug)]
pub(crate) enum TaskState {
    Submitted,
    Running,
    /// `None` once an exclusive (uncacheable) result has been taken.
    Completed(Option<QueryOutcome>),
    Failed(BackendError),
    Cancelled,
}

/// How a caller's wait on a task ended.
#[derive(Debug)]
pub(crate) enum WaitOutcome {
    Ready(QueryOutcome),
    TimedOut,
    Cancelled,
    Failed(BackendError),
    /// The wait itself was torn down (poisoned task state); resolved by the
    /// executor into an empty result, never surfaced as an error.
    Interrupted,
}

pub(crate) struct QueryTask {
    query: Arc<str>,
    kind: QueryKind,
    cacheable: bool,
    state: Mutex<TaskState>,
    progress: Condvar,
    cancelled: AtomicBool,
}

impl QueryTask {
    pub(crate) fn new(query: Arc<str>, kind: QueryKind, cacheable: bool) -> Self {
        Self {
            query,
            kind,
            cacheable,
            state: Mutex::new(TaskState::Submitted),
            progress: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Execute the query on the current (worker) thread.
    ///
    /// Acquires the concurrency guard's read access for the duration of the
    /// backend evaluation. Cacheable results are fully drained into snapshots
    /// before the guard is released; uncacheable results carry the guard with
    /// them.
    pub(crate) fn run(&self, backend: &Arc<dyn GraphBackend>, guard: &Arc<RwLock<()>>) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if matches!(*state, TaskState::Cancelled) {
                return;
            }
            *state = TaskState::Running;
        }

        let evaluated = self.evaluate(backend, guard);

        let mut state = match self.state.lock() {
            Ok(state) => state,
            // A poisoned state means an awaiting caller is already gone; the
            // result is unobservable either way.
            Err(poisoned) => poisoned.into_inner(),
        };
        if !matches!(*state, TaskState::Cancelled) {
            *state = match evaluated {
                Ok(Some(outcome)) => TaskState::Completed(Some(outcome)),
                // Drain aborted after a concurrent cancellation.
                Ok(None) => TaskState::Cancelled,
                Err(error) => TaskState::Failed(error),
            };
        }
        drop(state);
        self.progress.notify_all();
    }

    fn evaluate(
        &self,
        backend: &Arc<dyn GraphBackend>,
        guard: &Arc<RwLock<()>>,
    ) -> Result<Option<QueryOutcome>, BackendError> {
        let read_guard = guard.read_arc();
        match self.kind {
            QueryKind::Ask => backend
                .ask(&self.query)
                .map(|value| Some(QueryOutcome::Ask(value))),
            QueryKind::Select => {
                let evaluation = backend.select(&self.query)?;
                if self.cacheable {
                    let mut rows = Vec::new();
                    for row in evaluation.rows {
                        if self.is_cancelled() {
                            return Ok(None);
                        }
                        rows.push(row?);
                    }
                    let snapshot = SelectSnapshot::new(evaluation.variables, rows);
                    Ok(Some(QueryOutcome::Select(SelectResult::snapshot(
                        Arc::new(snapshot),
                    ))))
                } else {
                    Ok(Some(QueryOutcome::Select(SelectResult::live(
                        evaluation.variables,
                        evaluation.rows,
                        read_guard,
                    ))))
                }
            }
            QueryKind::Construct => {
                let evaluation = backend.construct(&self.query)?;
                if self.cacheable {
                    let mut statements: Vec<Statement> = Vec::new();
                    for statement in evaluation.statements {
                        if self.is_cancelled() {
                            return Ok(None);
                        }
                        statements.push(statement?);
                    }
                    Ok(Some(QueryOutcome::Construct(ConstructResult::snapshot(
                        Arc::new(statements),
                    ))))
                } else {
                    Ok(Some(QueryOutcome::Construct(ConstructResult::live(
                        evaluation.statements,
                        read_guard,
                    ))))
                }
            }
        }
    }

    /// Block until the task settles or the timeout expires.
    ///
    /// Every caller evaluates its own timeout independently; joiners of a
    /// shared task each receive their own handle onto the same snapshot.
    pub(crate) fn await_result(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let Ok(mut state) = self.state.lock() else {
            return WaitOutcome::Interrupted;
        };
        loop {
            match &mut *state {
                TaskState::Completed(slot) => {
                    return if self.cacheable {
                        match slot.as_ref().and_then(QueryOutcome::duplicate) {
                            Some(outcome) => WaitOutcome::Ready(outcome),
                            None => WaitOutcome::Cancelled,
                        }
                    } else {
                        match slot.take() {
                            Some(outcome) => WaitOutcome::Ready(outcome),
                            None => WaitOutcome::Cancelled,
                        }
                    };
                }
                TaskState::Failed(error) => return WaitOutcome::Failed(error.clone()),
                TaskState::Cancelled => return WaitOutcome::Cancelled,
                TaskState::Submitted | TaskState::Running => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    match self.progress.wait_timeout(state, deadline - now) {
                        Ok((guard, _)) => state = guard,
                        Err(_) => return WaitOutcome::Interrupted,
                    }
                }
            }
        }
    }

    /// Poison the state mutex by panicking a thread that holds it.
    #[cfg(test)]
    pub(crate) fn poison_state(self: &Arc<Self>) {
        let task = Arc::clone(self);
        let _ = std::thread::spawn(move || {
            let _state = task.state.lock().unwrap();
            panic!("poisoning task state");
        })
        .join();
    }

    /// Best-effort cancellation: flips the flag the worker checks between
    /// rows, settles the state if the task has not completed, and passes the
    /// hint on to the backend.
    pub(crate) fn cancel(&self, backend: &Arc<dyn GraphBackend>) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Ok(mut state) = self.state.lock() {
            if !matches!(*state, TaskState::Completed(_) | TaskState::Failed(_)) {
                *state = TaskState::Cancelled;
            }
        }
        self.progress.notify_all();
        backend.cancel();
    }
}

impl std::fmt::Debug for QueryTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryTask")
            .field("kind", &self.kind)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::{Read, Write};

    use crate::backend::{ConstructEvaluation, SelectEvaluation};

    struct BooleanBackend;

    impl GraphBackend for BooleanBackend {
        fn insert(&self, _: &HashSet<Statement>) -> Result<(), BackendError> {
            Ok(())
        }
        fn remove(&self, _: &HashSet<Statement>) -> Result<(), BackendError> {
            Ok(())
        }
        fn select(&self, _: &str) -> Result<SelectEvaluation, BackendError> {
            Ok(SelectEvaluation {
                variables: vec!["s".into()],
                rows: Box::new(std::iter::empty()),
            })
        }
        fn ask(&self, _: &str) -> Result<bool, BackendError> {
            Ok(true)
        }
        fn construct(&self, _: &str) -> Result<ConstructEvaluation, BackendError> {
            Ok(ConstructEvaluation {
                statements: Box::new(std::iter::empty()),
            })
        }
        fn load_turtle(&self, _: &mut dyn Read) -> Result<(), BackendError> {
            Ok(())
        }
        fn dump_turtle(&self, _: &mut dyn Write) -> Result<(), BackendError> {
            Ok(())
        }
        fn statements(&self) -> Result<Vec<Statement>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn fixtures() -> (Arc<dyn GraphBackend>, Arc<RwLock<()>>) {
        (Arc::new(BooleanBackend), Arc::new(RwLock::new(())))
    }

    #[test]
    fn completed_task_serves_every_joiner() {
        let (backend, guard) = fixtures();
        let task = QueryTask::new("ASK {}".into(), QueryKind::Ask, true);
        task.run(&backend, &guard);

        for _ in 0..3 {
            match task.await_result(Duration::from_millis(10)) {
                WaitOutcome::Ready(QueryOutcome::Ask(value)) => assert!(value),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[test]
    fn await_times_out_on_never_run_task() {
        let task = QueryTask::new("ASK {}".into(), QueryKind::Ask, true);
        assert!(matches!(
            task.await_result(Duration::from_millis(20)),
            WaitOutcome::TimedOut
        ));
    }

    #[test]
    fn cancelled_task_never_runs() {
        let (backend, guard) = fixtures();
        let task = QueryTask::new("ASK {}".into(), QueryKind::Ask, true);
        task.cancel(&backend);
        task.run(&backend, &guard);
        assert!(matches!(
            task.await_result(Duration::from_millis(10)),
            WaitOutcome::Cancelled
        ));
    }

    #[test]
    fn poisoned_state_resolves_to_interrupted() {
        let task = Arc::new(QueryTask::new("ASK {}".into(), QueryKind::Ask, true));
        task.poison_state();
        assert!(matches!(
            task.await_result(Duration::from_millis(10)),
            WaitOutcome::Interrupted
        ));
    }

    #[test]
    fn exclusive_result_is_taken_once() {
        let (backend, guard) = fixtures();
        let task = QueryTask::new("ASK {}".into(), QueryKind::Ask, false);
        task.run(&backend, &guard);

        assert!(matches!(
            task.await_result(Duration::from_millis(10)),
            WaitOutcome::Ready(_)
        ));
        assert!(matches!(
            task.await_result(Duration::from_millis(10)),
            WaitOutcome::Cancelled
        ));
    }
}
