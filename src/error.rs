//! Diagnostic error types for the semcore statement store.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. The taxonomy is strict:
//! timeouts, cancellations, and backend failures are always surfaced to the
//! caller; commit failures are fatal and never retried.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the semcore store.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, causes) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SemError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] CoreError),
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Errors raised at the graph-backend boundary.
///
/// `Clone` because a single failed computation may be awaited by several
/// coalesced callers, each of which receives its own copy of the cause.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum BackendError {
    #[error("backend store error: {message}")]
    #[diagnostic(
        code(semcore::backend::store),
        help(
            "The triple backend rejected a statement mutation. Check that the \
             store is initialized and, for on-disk stores, that the data \
             directory is writable."
        )
    )]
    Store { message: String },

    #[error("query evaluation error: {message}")]
    #[diagnostic(
        code(semcore::backend::evaluation),
        help("The SPARQL query failed to evaluate. Check the query syntax.")
    )]
    Evaluation { message: String },

    #[error("unexpected result form: expected {expected}")]
    #[diagnostic(
        code(semcore::backend::unexpected_results),
        help(
            "The backend returned a different result form than the query kind \
             expects. Use `select` for SELECT, `ask` for ASK and `construct` \
             for CONSTRUCT queries."
        )
    )]
    UnexpectedResults { expected: String },

    #[error("I/O error: {message}")]
    #[diagnostic(
        code(semcore::backend::io),
        help(
            "A serialization stream could not be read or written. Check the \
             input syntax and the target's permissions."
        )
    )]
    Io { message: String },
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("query took more than {}ms and was therefore cancelled", .timeout.as_millis())]
    #[diagnostic(
        code(semcore::query::timeout),
        help(
            "The query did not complete within its timeout. Increase the \
             timeout, simplify the query, or check for a writer holding the \
             store lock."
        )
    )]
    Timeout { timeout: Duration },

    #[error("query computation was cancelled")]
    #[diagnostic(
        code(semcore::query::cancelled),
        help(
            "The shared computation this call was attached to has been \
             cancelled by another caller's timeout. Re-issuing the query \
             starts a fresh computation."
        )
    )]
    Cancelled,

    #[error("query execution failed")]
    #[diagnostic(
        code(semcore::query::execution),
        help("The backend reported an error while evaluating the query.")
    )]
    Execution {
        #[source]
        source: BackendError,
    },
}

// ---------------------------------------------------------------------------
// Mutation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MutationError {
    #[error("commit failed: backend rejected a statement batch")]
    #[diagnostic(
        code(semcore::mutation::backend),
        help(
            "A backend write failed during commit. The staged change sets are \
             left as they were at the point of failure; no retry is attempted. \
             Note that the removal batch may already have been applied."
        )
    )]
    Backend {
        #[source]
        source: BackendError,
    },
}

// ---------------------------------------------------------------------------
// Statement errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StatementError {
    #[error("invalid IRI: {iri}")]
    #[diagnostic(
        code(semcore::statement::invalid_iri),
        help("Statement terms must be absolute IRIs or prefixed names with a registered prefix.")
    )]
    InvalidIri { iri: String },

    #[error("unknown namespace prefix: {prefix}")]
    #[diagnostic(
        code(semcore::statement::unknown_prefix),
        help("Register the prefix with `add_namespace` before using it in a prefixed name.")
    )]
    UnknownPrefix { prefix: String },

    #[error("invalid language tag: {tag}")]
    #[diagnostic(
        code(semcore::statement::invalid_language_tag),
        help("Language tags must follow BCP 47, e.g. `en` or `de-AT`.")
    )]
    InvalidLanguageTag { tag: String },
}

// ---------------------------------------------------------------------------
// Core errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(semcore::core::invalid_config),
        help("Check the CoreConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("failed to start query worker pool: {message}")]
    #[diagnostic(
        code(semcore::core::worker_pool),
        help("The fixed-size SPARQL worker pool could not be created.")
    )]
    WorkerPool { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(semcore::core::data_dir),
        help(
            "The data directory could not be accessed. \
             Ensure the path exists and has read/write permissions."
        )
    )]
    DataDir { path: String },
}

/// Convenience alias for functions returning semcore results.
pub type SemResult<T> = std::result::Result<T, SemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_converts_to_sem_error() {
        let err = BackendError::Store {
            message: "disk full".into(),
        };
        let sem: SemError = err.into();
        assert!(matches!(sem, SemError::Backend(BackendError::Store { .. })));
    }

    #[test]
    fn timeout_display_names_the_duration() {
        let err = QueryError::Timeout {
            timeout: Duration::from_millis(50),
        };
        let msg = format!("{err}");
        assert!(msg.contains("50ms"));
    }

    #[test]
    fn execution_error_preserves_cause() {
        let err = QueryError::Execution {
            source: BackendError::Evaluation {
                message: "parse error at 1:3".into(),
            },
        };
        let cause = std::error::Error::source(&err).unwrap();
        assert!(format!("{cause}").contains("parse error"));
    }
}
