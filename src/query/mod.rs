//! SPARQL query subsystem: materialized results, shared cancellable tasks,
//! the access-ordered result cache, and the worker-pool executor.
//!
//! Cacheable queries are drained into immutable snapshots while the read lock
//! is held, so callers never touch the backend while iterating. Uncacheable
//! queries hand back a live handle that keeps the read lock until dropped.

pub mod cache;
pub mod executor;
pub mod task;

use std::fmt;
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, RawRwLock};

use crate::backend::Row;
use crate::error::{BackendError, QueryError};
use crate::statement::Statement;

/// Owned read-lock guard for the store's concurrency guard; lives inside live
/// result handles and releases the lock when the handle is dropped.
pub(crate) type BackendReadGuard = ArcRwLockReadGuard<RawRwLock, ()>;

/// The three supported query forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Ask,
    Construct,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Ask => write!(f, "ASK"),
            Self::Construct => write!(f, "CONSTRUCT"),
        }
    }
}

/// An immutable, fully materialized SELECT result.
///
/// Never reflects backend mutations that occur after materialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectSnapshot {
    variables: Vec<String>,
    rows: Vec<Row>,
}

impl SelectSnapshot {
    pub(crate) fn new(variables: Vec<String>, rows: Vec<Row>) -> Self {
        Self { variables, rows }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a cell by row index and variable name.
    pub fn value(&self, row: usize, variable: &str) -> Option<&oxigraph::model::Term> {
        let column = self.variables.iter().position(|v| v == variable)?;
        self.rows.get(row)?.get(column)?.as_ref()
    }

    /// Cache cost: rows × columns.
    pub fn cells(&self) -> usize {
        self.rows.len() * self.variables.len()
    }
}

/// Result of a SELECT query: either a shared snapshot or a live row stream
/// that holds the backend read lock until dropped or closed.
pub struct SelectResult {
    inner: SelectInner,
}

enum SelectInner {
    Snapshot {
        data: Arc<SelectSnapshot>,
        cursor: usize,
    },
    Live {
        variables: Vec<String>,
        rows: Box<dyn Iterator<Item = Result<Row, BackendError>> + Send>,
        _guard: BackendReadGuard,
    },
}

impl SelectResult {
    pub(crate) fn snapshot(data: Arc<SelectSnapshot>) -> Self {
        Self {
            inner: SelectInner::Snapshot { data, cursor: 0 },
        }
    }

    pub(crate) fn live(
        variables: Vec<String>,
        rows: Box<dyn Iterator<Item = Result<Row, BackendError>> + Send>,
        guard: BackendReadGuard,
    ) -> Self {
        Self {
            inner: SelectInner::Live {
                variables,
                rows,
                _guard: guard,
            },
        }
    }

    /// The column-name schema, in selection order.
    pub fn variables(&self) -> &[String] {
        match &self.inner {
            SelectInner::Snapshot { data, .. } => data.variables(),
            SelectInner::Live { variables, .. } => variables,
        }
    }

    /// The underlying snapshot, if this result was materialized.
    pub fn as_snapshot(&self) -> Option<&Arc<SelectSnapshot>> {
        match &self.inner {
            SelectInner::Snapshot { data, .. } => Some(data),
            SelectInner::Live { .. } => None,
        }
    }

    /// Release the result; for live results this releases the read lock.
    pub fn close(self) {}

    pub(crate) fn duplicate(&self) -> Option<Self> {
        match &self.inner {
            SelectInner::Snapshot { data, .. } => Some(Self::snapshot(Arc::clone(data))),
            SelectInner::Live { .. } => None,
        }
    }
}

impl Iterator for SelectResult {
    type Item = Result<Row, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            SelectInner::Snapshot { data, cursor } => {
                let row = data.rows().get(*cursor)?.clone();
                *cursor += 1;
                Some(Ok(row))
            }
            SelectInner::Live { rows, .. } => Some(
                rows.next()?
                    .map_err(|source| QueryError::Execution { source }),
            ),
        }
    }
}

impl fmt::Debug for SelectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            SelectInner::Snapshot { data, .. } => f
                .debug_struct("SelectResult")
                .field("rows", &data.len())
                .finish(),
            SelectInner::Live { .. } => f.debug_struct("SelectResult").finish_non_exhaustive(),
        }
    }
}

/// Result of a CONSTRUCT query, snapshot or live, mirroring [`SelectResult`].
pub struct ConstructResult {
    inner: ConstructInner,
}

enum ConstructInner {
    Snapshot {
        data: Arc<Vec<Statement>>,
        cursor: usize,
    },
    Live {
        statements: Box<dyn Iterator<Item = Result<Statement, BackendError>> + Send>,
        _guard: BackendReadGuard,
    },
}

impl ConstructResult {
    pub(crate) fn snapshot(data: Arc<Vec<Statement>>) -> Self {
        Self {
            inner: ConstructInner::Snapshot { data, cursor: 0 },
        }
    }

    pub(crate) fn live(
        statements: Box<dyn Iterator<Item = Result<Statement, BackendError>> + Send>,
        guard: BackendReadGuard,
    ) -> Self {
        Self {
            inner: ConstructInner::Live {
                statements,
                _guard: guard,
            },
        }
    }

    /// The underlying snapshot, if this result was materialized.
    pub fn as_snapshot(&self) -> Option<&Arc<Vec<Statement>>> {
        match &self.inner {
            ConstructInner::Snapshot { data, .. } => Some(data),
            ConstructInner::Live { .. } => None,
        }
    }

    /// Release the result; for live results this releases the read lock.
    pub fn close(self) {}

    pub(crate) fn duplicate(&self) -> Option<Self> {
        match &self.inner {
            ConstructInner::Snapshot { data, .. } => Some(Self::snapshot(Arc::clone(data))),
            ConstructInner::Live { .. } => None,
        }
    }
}

impl Iterator for ConstructResult {
    type Item = Result<Statement, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            ConstructInner::Snapshot { data, cursor } => {
                let statement = data.get(*cursor)?.clone();
                *cursor += 1;
                Some(Ok(statement))
            }
            ConstructInner::Live { statements, .. } => Some(
                statements
                    .next()?
                    .map_err(|source| QueryError::Execution { source }),
            ),
        }
    }
}

impl fmt::Debug for ConstructResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ConstructInner::Snapshot { data, .. } => f
                .debug_struct("ConstructResult")
                .field("statements", &data.len())
                .finish(),
            ConstructInner::Live { .. } => f.debug_struct("ConstructResult").finish_non_exhaustive(),
        }
    }
}

/// What a finished query task produced.
#[derive(Debug)]
pub(crate) enum QueryOutcome {
    Select(SelectResult),
    Construct(ConstructResult),
    Ask(bool),
}

impl QueryOutcome {
    /// The canonical empty result for a query kind: no rows, no statements,
    /// `false`.
    pub(crate) fn empty(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Select => Self::Select(SelectResult::snapshot(Arc::default())),
            QueryKind::Construct => Self::Construct(ConstructResult::snapshot(Arc::default())),
            QueryKind::Ask => Self::Ask(false),
        }
    }

    /// A second handle onto the same materialized data; `None` for live
    /// results, which are never shared.
    pub(crate) fn duplicate(&self) -> Option<Self> {
        match self {
            Self::Select(result) => result.duplicate().map(Self::Select),
            Self::Construct(result) => result.duplicate().map(Self::Construct),
            Self::Ask(value) => Some(Self::Ask(*value)),
        }
    }

    /// Cache cost in cells; `None` for live results.
    pub(crate) fn cells(&self) -> Option<usize> {
        match self {
            Self::Select(result) => result.as_snapshot().map(|data| data.cells()),
            Self::Construct(result) => result.as_snapshot().map(|data| data.len()),
            Self::Ask(_) => Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_outcomes_match_their_kind() {
        match QueryOutcome::empty(QueryKind::Select) {
            QueryOutcome::Select(result) => assert!(result.as_snapshot().unwrap().is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match QueryOutcome::empty(QueryKind::Ask) {
            QueryOutcome::Ask(value) => assert!(!value),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn snapshot_cells_are_rows_times_columns() {
        let snapshot = SelectSnapshot::new(
            vec!["s".into(), "o".into()],
            vec![vec![None, None], vec![None, None], vec![None, None]],
        );
        assert_eq!(snapshot.cells(), 6);
    }

    #[test]
    fn select_result_iterates_snapshot_rows() {
        let snapshot = Arc::new(SelectSnapshot::new(
            vec!["s".into()],
            vec![vec![None], vec![None]],
        ));
        let result = SelectResult::snapshot(snapshot);
        assert_eq!(result.count(), 2);
    }
}
