//! Store facade: provenance-scoped assertion, the staged commit protocol,
//! and the concurrent query surface.
//!
//! One `SemanticCore` is constructed per compilation pipeline and passed
//! explicitly wherever it is needed; there is no ambient global instance.
//!
//! The mutation surface (`assert*`, `retract*`, `commit`) is meant to be
//! driven by one pipeline at a time; the internal mutex only guarantees
//! memory safety, not ordering between concurrent mutators. The query
//! surface is safe to call from arbitrary threads.

use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use oxigraph::model::{Subject, Term};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::backend::{GraphBackend, OxigraphBackend};
use crate::config::CoreConfig;
use crate::error::{CoreError, MutationError, QueryError, SemResult, StatementError};
use crate::events::{CommitObserver, StatementsEvent};
use crate::namespaces::Namespaces;
use crate::provenance::ProvenanceLedger;
use crate::query::executor::QueryExecutor;
use crate::query::{ConstructResult, QueryKind, QueryOutcome, SelectResult};
use crate::statement::{parse_iri, Statement, StatementSource};

/// Staged changes below the verbose-log threshold are listed one by one.
const VERBOSE_LOG_LIMIT: usize = 50;

/// Counts of statements applied by a commit, after the hazard filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub removed: usize,
    pub inserted: usize,
}

#[derive(Debug, Default)]
struct MutationState {
    ledger: ProvenanceLedger,
    to_insert: HashSet<Statement>,
    to_remove: HashSet<Statement>,
}

/// The semantic statement store.
///
/// Owns the provenance ledger, the pending change set, and the query cache;
/// mediates every backend access through a single reader/writer lock. The
/// backend tolerates many concurrent readers but degrades badly when mutated
/// during a read, hence writes are exclusive and reads are shared.
pub struct SemanticCore {
    config: CoreConfig,
    backend: Arc<dyn GraphBackend>,
    guard: Arc<RwLock<()>>,
    namespaces: RwLock<Namespaces>,
    mutation: Mutex<MutationState>,
    executor: QueryExecutor,
    observers: RwLock<Vec<Arc<dyn CommitObserver>>>,
}

impl SemanticCore {
    /// Create a store over an oxigraph backend, in-memory or persistent
    /// depending on `config.data_dir`.
    pub fn new(config: CoreConfig) -> SemResult<Self> {
        let backend: Arc<dyn GraphBackend> = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|_| CoreError::DataDir {
                    path: dir.display().to_string(),
                })?;
                Arc::new(OxigraphBackend::open(&dir.join("oxigraph"))?)
            }
            None => Arc::new(OxigraphBackend::in_memory()?),
        };
        Self::with_backend(config, backend)
    }

    /// Create a store over an explicit backend implementation.
    pub fn with_backend(config: CoreConfig, backend: Arc<dyn GraphBackend>) -> SemResult<Self> {
        if config.cache_budget_cells == 0 {
            return Err(CoreError::InvalidConfig {
                message: "cache_budget_cells must be > 0".into(),
            }
            .into());
        }
        if config.default_timeout.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "default_timeout must be > 0".into(),
            }
            .into());
        }

        let guard = Arc::new(RwLock::new(()));
        let workers = config
            .worker_threads
            .unwrap_or_else(QueryExecutor::default_workers);
        let executor = QueryExecutor::new(
            Arc::clone(&backend),
            Arc::clone(&guard),
            workers,
            config.cache_budget_cells,
        )?;
        let namespaces = Namespaces::with_defaults(&config.local_namespace, &config.base_namespace);

        tracing::info!(
            workers,
            cache_budget_cells = config.cache_budget_cells,
            persistent = config.data_dir.is_some(),
            "initializing semantic core"
        );

        Ok(Self {
            config,
            backend,
            guard,
            namespaces: RwLock::new(namespaces),
            mutation: Mutex::new(MutationState::default()),
            executor,
            observers: RwLock::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Provenance ledger & staging
    // -----------------------------------------------------------------------

    /// Assert statements under a source.
    ///
    /// A statement not yet linked to any source is staged for insertion; the
    /// (source, statement) link is recorded unconditionally, even when the
    /// statement was already asserted under another source. Nothing reaches
    /// the backend until [`commit`](Self::commit).
    pub fn assert(
        &self,
        source: &StatementSource,
        statements: impl IntoIterator<Item = Statement>,
    ) {
        let mut mutation = self.mutation.lock();
        for statement in statements {
            if !mutation.ledger.is_linked(&statement) {
                mutation.to_insert.insert(statement.clone());
            }
            mutation.ledger.record(source.clone(), statement);
        }
    }

    /// Assert statements with no source.
    ///
    /// The ledger is bypassed: the caller takes full responsibility for
    /// removing these statements again via [`retract`](Self::retract).
    pub fn assert_unsourced(&self, statements: impl IntoIterator<Item = Statement>) {
        self.mutation.lock().to_insert.extend(statements);
    }

    /// Retract every statement asserted under the given source.
    ///
    /// Statements still linked to another source stay live; only statements
    /// left with zero links are staged for removal. Retracting a source with
    /// nothing recorded is a legal no-op.
    pub fn retract_all_for(&self, source: &StatementSource) {
        let mut mutation = self.mutation.lock();
        let orphaned = mutation.ledger.unlink_source(source);
        mutation.to_remove.extend(orphaned);
    }

    /// Stage the given statements for removal, bypassing the ledger.
    ///
    /// Counterpart of [`assert_unsourced`](Self::assert_unsourced).
    pub fn retract(&self, statements: impl IntoIterator<Item = Statement>) {
        self.mutation.lock().to_remove.extend(statements);
    }

    /// Drain the whole ledger and stage every live statement for removal.
    pub fn retract_everything(&self) {
        let mut mutation = self.mutation.lock();
        let drained = mutation.ledger.drain();
        mutation.to_remove.extend(drained);
    }

    /// The sources currently asserting the given statement. Empty for
    /// statements added unsourced or not added at all.
    pub fn sources_of(&self, statement: &Statement) -> Vec<StatementSource> {
        self.mutation.lock().ledger.sources_of(statement)
    }

    /// The statements currently asserted under the given source.
    pub fn statements_of(&self, source: &StatementSource) -> Vec<Statement> {
        self.mutation.lock().ledger.statements_of(source)
    }

    /// True until the first sourced assertion is recorded.
    pub fn is_empty(&self) -> bool {
        self.mutation.lock().ledger.is_empty()
    }

    // -----------------------------------------------------------------------
    // Transaction committer
    // -----------------------------------------------------------------------

    /// Reconcile the staged change sets and flush them to the backend.
    ///
    /// Holds the write lock for the whole operation; removal strictly
    /// precedes insertion. The hazard filter drops from the remove set every
    /// statement also scheduled for insertion — removal is expensive while
    /// duplicate inserts are cheap and tolerated by the backend. Any
    /// non-empty commit invalidates the entire query cache.
    ///
    /// On a backend failure the staged sets are left as they were at the
    /// point of failure and the error is surfaced; no retry is attempted.
    pub fn commit(&self) -> Result<CommitSummary, MutationError> {
        let _write = self.guard.write();
        let mut mutation = self.mutation.lock();
        if mutation.to_insert.is_empty() && mutation.to_remove.is_empty() {
            return Ok(CommitSummary::default());
        }

        // The cache is dropped before the backend is touched: a commit that
        // fails partway must not leave snapshots contradicting the model.
        self.executor.invalidate();

        let started = Instant::now();
        let MutationState {
            to_insert,
            to_remove,
            ..
        } = &mut *mutation;

        let staged_removed: Vec<Statement> = to_remove.iter().cloned().collect();
        let staged_inserted: Vec<Statement> = to_insert.iter().cloned().collect();
        let applied_inserted: Vec<Statement> = to_insert.difference(to_remove).cloned().collect();

        // Hazard filter: a statement scheduled for re-insertion is never
        // removed. The insert set is left untouched.
        to_remove.retain(|statement| !to_insert.contains(statement));

        self.backend
            .remove(to_remove)
            .map_err(|source| MutationError::Backend { source })?;
        let removed_event = StatementsEvent {
            staged: staged_removed,
            applied: to_remove.iter().cloned().collect(),
        };
        self.notify(|observer| observer.statements_removed(&removed_event));

        self.backend
            .insert(to_insert)
            .map_err(|source| MutationError::Backend { source })?;
        let inserted_event = StatementsEvent {
            staged: staged_inserted,
            applied: applied_inserted,
        };
        self.notify(|observer| observer.statements_inserted(&inserted_event));

        let summary = CommitSummary {
            removed: removed_event.applied.len(),
            inserted: to_insert.len(),
        };
        self.log_commit(&removed_event, &inserted_event, started);

        to_insert.clear();
        to_remove.clear();
        Ok(summary)
    }

    /// Register an observer for commit notifications.
    pub fn add_observer(&self, observer: Arc<dyn CommitObserver>) {
        self.observers.write().push(observer);
    }

    fn notify(&self, mut call: impl FnMut(&dyn CommitObserver)) {
        for observer in self.observers.read().iter() {
            call(observer.as_ref());
        }
    }

    fn log_commit(
        &self,
        removed: &StatementsEvent,
        inserted: &StatementsEvent,
        started: Instant,
    ) {
        let staged_total = removed.staged.len() + inserted.staged.len();
        if staged_total < VERBOSE_LOG_LIMIT {
            for statement in &removed.applied {
                tracing::debug!(statement = %self.verbalize(statement), "statement removed");
            }
            for statement in &inserted.staged {
                tracing::debug!(statement = %self.verbalize(statement), "statement inserted");
            }
        }
        tracing::info!(
            removed = removed.applied.len(),
            inserted = inserted.staged.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "committed statement batch"
        );
    }

    /// Render a statement with namespace-shortened IRIs for log output.
    fn verbalize(&self, statement: &Statement) -> String {
        let namespaces = self.namespaces.read();
        let subject = match &statement.subject {
            Subject::NamedNode(node) => namespaces.shorten(node.as_str()),
            other => other.to_string(),
        };
        let predicate = namespaces.shorten(statement.predicate.as_str());
        let object = match &statement.object {
            Term::NamedNode(node) => namespaces.shorten(node.as_str()),
            other => other.to_string(),
        };
        format!("{subject} {predicate} {object}")
    }

    // -----------------------------------------------------------------------
    // Query surface
    // -----------------------------------------------------------------------

    /// Cached SELECT with the default timeout.
    pub fn select(&self, query: &str) -> Result<SelectResult, QueryError> {
        self.select_with(query, true, self.config.default_timeout)
    }

    /// SELECT with explicit caching and timeout parameters.
    ///
    /// With `cacheable = false` the returned result is live: it holds the
    /// store's read access until dropped or closed, and must not be kept
    /// around across a commit attempt.
    pub fn select_with(
        &self,
        query: &str,
        cacheable: bool,
        timeout: Duration,
    ) -> Result<SelectResult, QueryError> {
        match self.run(query, QueryKind::Select, cacheable, timeout)? {
            QueryOutcome::Select(result) => Ok(result),
            other => Err(Self::mismatch("solution rows", &other)),
        }
    }

    /// Cached ASK with the default timeout.
    pub fn ask(&self, query: &str) -> Result<bool, QueryError> {
        self.ask_with(query, true, self.config.default_timeout)
    }

    /// ASK with explicit caching and timeout parameters.
    pub fn ask_with(
        &self,
        query: &str,
        cacheable: bool,
        timeout: Duration,
    ) -> Result<bool, QueryError> {
        match self.run(query, QueryKind::Ask, cacheable, timeout)? {
            QueryOutcome::Ask(value) => Ok(value),
            other => Err(Self::mismatch("boolean", &other)),
        }
    }

    /// Cached CONSTRUCT with the default timeout.
    pub fn construct(&self, query: &str) -> Result<ConstructResult, QueryError> {
        self.construct_with(query, true, self.config.default_timeout)
    }

    /// CONSTRUCT with explicit caching and timeout parameters.
    pub fn construct_with(
        &self,
        query: &str,
        cacheable: bool,
        timeout: Duration,
    ) -> Result<ConstructResult, QueryError> {
        match self.run(query, QueryKind::Construct, cacheable, timeout)? {
            QueryOutcome::Construct(result) => Ok(result),
            other => Err(Self::mismatch("statements", &other)),
        }
    }

    fn run(
        &self,
        query: &str,
        kind: QueryKind,
        cacheable: bool,
        timeout: Duration,
    ) -> Result<QueryOutcome, QueryError> {
        let normalized = self.namespaces.read().normalize(query);
        self.executor.execute(normalized, kind, cacheable, timeout)
    }

    fn mismatch(expected: &str, outcome: &QueryOutcome) -> QueryError {
        QueryError::Execution {
            source: crate::error::BackendError::UnexpectedResults {
                expected: format!("{expected}, got {outcome:?}"),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Namespaces
    // -----------------------------------------------------------------------

    /// Register a namespace under an abbreviation. Changes the prologue used
    /// for query normalization, so earlier cached results become unreachable
    /// keys and age out.
    pub fn add_namespace(&self, abbreviation: &str, namespace: &str) {
        let _write = self.guard.write();
        self.namespaces.write().insert(abbreviation, namespace);
    }

    /// Remove a namespace, returning its IRI if it was registered.
    pub fn remove_namespace(&self, abbreviation: &str) -> Option<String> {
        let _write = self.guard.write();
        self.namespaces.write().remove(abbreviation)
    }

    /// All namespaces, keyed by abbreviation.
    pub fn namespaces(&self) -> BTreeMap<String, String> {
        self.namespaces.read().all().clone()
    }

    /// Shorten an IRI using the namespace table (longest match wins).
    pub fn shorten_iri(&self, iri: &str) -> String {
        self.namespaces.read().shorten(iri)
    }

    /// Build a statement from IRIs or prefixed names, expanding prefixes
    /// against the namespace table.
    pub fn create_statement(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> Result<Statement, StatementError> {
        let namespaces = self.namespaces.read();
        Ok(Statement::new(
            parse_iri(&namespaces.expand(subject)?)?,
            parse_iri(&namespaces.expand(predicate)?)?,
            parse_iri(&namespaces.expand(object)?)?,
        ))
    }

    /// Build a statement with a literal object (see [`crate::statement::plain_literal`],
    /// [`crate::statement::typed_literal`], [`crate::statement::language_literal`]),
    /// expanding subject and predicate prefixes against the namespace table.
    pub fn create_literal_statement(
        &self,
        subject: &str,
        predicate: &str,
        object: Term,
    ) -> Result<Statement, StatementError> {
        let namespaces = self.namespaces.read();
        Ok(Statement::new(
            parse_iri(&namespaces.expand(subject)?)?,
            parse_iri(&namespaces.expand(predicate)?)?,
            object,
        ))
    }

    // -----------------------------------------------------------------------
    // Bulk transfer
    // -----------------------------------------------------------------------

    /// Bulk-load Turtle into the backend under exclusive access.
    ///
    /// Loaded statements bypass the ledger, like unsourced assertions.
    pub fn load_turtle(&self, mut reader: impl Read) -> SemResult<()> {
        let _write = self.guard.write();
        self.backend.load_turtle(&mut reader)?;
        Ok(())
    }

    /// Serialize the full model as Turtle under shared access.
    pub fn dump_turtle(&self, mut writer: impl Write) -> SemResult<()> {
        let _read = self.guard.read();
        self.backend.dump_turtle(&mut writer)?;
        Ok(())
    }

    /// Every statement currently committed to the backend.
    pub fn statements(&self) -> SemResult<Vec<Statement>> {
        let _read = self.guard.read();
        Ok(self.backend.statements()?)
    }
}

impl std::fmt::Debug for SemanticCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCore")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::iri_statement;

    fn core() -> SemanticCore {
        SemanticCore::new(CoreConfig::default()).unwrap()
    }

    fn st(subject: &str) -> Statement {
        iri_statement(subject, "http://ex.org/p", "http://ex.org/b").unwrap()
    }

    #[test]
    fn assert_commit_ask_round_trip() {
        let core = core();
        let source = StatementSource::section("n1");
        core.assert(&source, [st("http://ex.org/a")]);
        assert!(core.commit().unwrap().inserted == 1);
        assert!(core
            .ask("ASK { <http://ex.org/a> <http://ex.org/p> <http://ex.org/b> }")
            .unwrap());
    }

    #[test]
    fn empty_commit_is_a_noop() {
        let core = core();
        assert_eq!(core.commit().unwrap(), CommitSummary::default());
    }

    #[test]
    fn create_statement_expands_prefixes() {
        let core = core();
        core.add_namespace("ex", "http://example.org/");
        let statement = core.create_statement("ex:a", "ex:p", "ex:b").unwrap();
        assert_eq!(statement.predicate.as_str(), "http://example.org/p");
    }

    #[test]
    fn literal_statement_commits_and_matches() {
        let core = core();
        core.add_namespace("ex", "http://ex.org/");
        let statement = core
            .create_literal_statement("ex:a", "ex:p", crate::statement::plain_literal("42"))
            .unwrap();
        core.assert(&StatementSource::section("n1"), [statement]);
        core.commit().unwrap();
        assert!(core.ask("ASK { ex:a ex:p \"42\" }").unwrap());
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let core = core();
        assert!(matches!(
            core.create_statement("nope:a", "nope:p", "nope:b"),
            Err(StatementError::UnknownPrefix { .. })
        ));
    }

    #[test]
    fn zero_cache_budget_rejected() {
        let result = SemanticCore::new(CoreConfig {
            cache_budget_cells: 0,
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn verbalize_shortens_known_namespaces() {
        let core = core();
        core.add_namespace("ex", "http://ex.org/");
        let rendered = core.verbalize(&st("http://ex.org/a"));
        assert_eq!(rendered, "ex:a ex:p ex:b");
    }
}
