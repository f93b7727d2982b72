//! # semcore
//!
//! A semantic statement store for incremental knowledge compilation:
//! provenance-tracked assertion, batched commits, and a concurrent,
//! cached SPARQL query surface over an oxigraph backend.
//!
//! ## Architecture
//!
//! - **Provenance ledger** (`provenance`): many-to-many source ↔ statement
//!   index; a statement stays live while any source still asserts it
//! - **Staged commits** (`core`): assertions and retractions accumulate in
//!   change sets and reach the backend only on [`SemanticCore::commit`],
//!   after a hazard filter drops remove/insert collisions
//! - **Query executor** (`query`): fixed worker pool, per-query timeout and
//!   cancellation, single-flight coalescing, and a cell-budgeted LRU result
//!   cache invalidated wholesale by every non-empty commit
//! - **Backend seam** (`backend`): the [`GraphBackend`] trait isolates the
//!   store from the triple engine; [`OxigraphBackend`] is the default
//! - **Namespaces** (`namespaces`): prefix table with cached SPARQL prologue,
//!   prepended to every query before execution
//!
//! ## Library usage
//!
//! ```no_run
//! use semcore::{CoreConfig, SemanticCore, StatementSource, iri_statement};
//!
//! let core = SemanticCore::new(CoreConfig::default()).unwrap();
//! let source = StatementSource::section("article-42");
//! let statement = iri_statement(
//!     "http://example.org/sun",
//!     "http://example.org/is-a",
//!     "http://example.org/star",
//! ).unwrap();
//! core.assert(&source, [statement]);
//! core.commit().unwrap();
//! assert!(core.ask("ASK { ?s ?p ?o }").unwrap());
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod namespaces;
pub mod provenance;
pub mod query;
pub mod statement;

pub use backend::{ConstructEvaluation, GraphBackend, OxigraphBackend, Row, SelectEvaluation};
pub use config::{CoreConfig, DEFAULT_CACHE_BUDGET_CELLS, DEFAULT_TIMEOUT};
pub use core::{CommitSummary, SemanticCore};
pub use error::{
    BackendError, CoreError, MutationError, QueryError, SemError, SemResult, StatementError,
};
pub use events::{CommitObserver, StatementsEvent};
pub use namespaces::Namespaces;
pub use provenance::ProvenanceLedger;
pub use query::{ConstructResult, QueryKind, SelectResult, SelectSnapshot};
pub use statement::{
    iri_statement, language_literal, literal_statement, plain_literal, typed_literal, Statement,
    StatementSource,
};
