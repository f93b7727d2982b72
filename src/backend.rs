//! Graph-backend boundary: the trait the store drives, and its oxigraph
//! implementation.
//!
//! The backend stores triples and evaluates SPARQL; it exposes no concurrency
//! guarantees of its own. All access goes through the store's reader/writer
//! guard, never through this module directly.

use std::collections::HashSet;
use std::io::{Read, Write};

use oxigraph::io::RdfFormat;
use oxigraph::model::{GraphName, GraphNameRef, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::BackendError;
use crate::statement::Statement;

/// A single solution row, one entry per selected variable.
pub type Row = Vec<Option<Term>>;

/// A select evaluation in progress: the column schema plus a row stream.
///
/// The stream must be `Send` so the worker pool can hand it to a waiting
/// caller; backends whose native iterators are not `Send` materialize their
/// rows before returning.
pub struct SelectEvaluation {
    pub variables: Vec<String>,
    pub rows: Box<dyn Iterator<Item = Result<Row, BackendError>> + Send>,
}

/// A construct evaluation in progress: a statement stream.
pub struct ConstructEvaluation {
    pub statements: Box<dyn Iterator<Item = Result<Statement, BackendError>> + Send>,
}

/// The triple backend the store sits on top of.
///
/// Duplicate inserts must be tolerated (they are cheap no-ops for RDF stores);
/// removal of absent statements likewise.
pub trait GraphBackend: Send + Sync {
    /// Add a batch of statements.
    fn insert(&self, statements: &HashSet<Statement>) -> Result<(), BackendError>;

    /// Remove a batch of statements.
    fn remove(&self, statements: &HashSet<Statement>) -> Result<(), BackendError>;

    /// Evaluate a SPARQL SELECT query.
    fn select(&self, query: &str) -> Result<SelectEvaluation, BackendError>;

    /// Evaluate a SPARQL ASK query.
    fn ask(&self, query: &str) -> Result<bool, BackendError>;

    /// Evaluate a SPARQL CONSTRUCT query.
    fn construct(&self, query: &str) -> Result<ConstructEvaluation, BackendError>;

    /// Bulk-load Turtle from a stream.
    fn load_turtle(&self, reader: &mut dyn Read) -> Result<(), BackendError>;

    /// Serialize the whole model as Turtle.
    fn dump_turtle(&self, writer: &mut dyn Write) -> Result<(), BackendError>;

    /// Every statement currently in the backend.
    fn statements(&self) -> Result<Vec<Statement>, BackendError>;

    /// Best-effort cancellation hint for an in-flight evaluation.
    ///
    /// Called when a caller's timeout cancels a computation. Backends that
    /// cannot interrupt an evaluation simply let it run to completion in the
    /// background; the default does nothing.
    fn cancel(&self) {}
}

/// SPARQL backend backed by an oxigraph [`Store`].
pub struct OxigraphBackend {
    store: Store,
}

impl OxigraphBackend {
    /// Create a new in-memory backend (no persistence).
    pub fn in_memory() -> Result<Self, BackendError> {
        let store = Store::new().map_err(|e| BackendError::Store {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Open or create a persistent backend at the given path.
    pub fn open(path: &std::path::Path) -> Result<Self, BackendError> {
        std::fs::create_dir_all(path).map_err(|e| BackendError::Store {
            message: format!("failed to create oxigraph directory: {e}"),
        })?;
        let store = Store::open(path).map_err(|e| BackendError::Store {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Ok(Self { store })
    }

    fn to_quad(statement: &Statement) -> Quad {
        Quad::new(
            statement.subject.clone(),
            statement.predicate.clone(),
            statement.object.clone(),
            GraphName::DefaultGraph,
        )
    }

    fn query(&self, query: &str) -> Result<QueryResults, BackendError> {
        self.store.query(query).map_err(|e| BackendError::Evaluation {
            message: format!("SPARQL query failed: {e}"),
        })
    }
}

impl GraphBackend for OxigraphBackend {
    fn insert(&self, statements: &HashSet<Statement>) -> Result<(), BackendError> {
        for statement in statements {
            let quad = Self::to_quad(statement);
            self.store.insert(&quad).map_err(|e| BackendError::Store {
                message: format!("insert failed: {e}"),
            })?;
        }
        Ok(())
    }

    fn remove(&self, statements: &HashSet<Statement>) -> Result<(), BackendError> {
        for statement in statements {
            let quad = Self::to_quad(statement);
            self.store.remove(&quad).map_err(|e| BackendError::Store {
                message: format!("remove failed: {e}"),
            })?;
        }
        Ok(())
    }

    fn select(&self, query: &str) -> Result<SelectEvaluation, BackendError> {
        match self.query(query)? {
            QueryResults::Solutions(solutions) => {
                let variables: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_owned())
                    .collect();
                // oxigraph's solution iterator is not Send, so rows are
                // drained here; the evaluation crosses threads as a Vec.
                let mut rows: Vec<Result<Row, BackendError>> = Vec::new();
                for solution in solutions {
                    rows.push(
                        solution
                            .map(|solution| {
                                variables
                                    .iter()
                                    .map(|variable| solution.get(variable.as_str()).cloned())
                                    .collect()
                            })
                            .map_err(|e| BackendError::Evaluation {
                                message: format!("solution error: {e}"),
                            }),
                    );
                }
                Ok(SelectEvaluation {
                    variables,
                    rows: Box::new(rows.into_iter()),
                })
            }
            _ => Err(BackendError::UnexpectedResults {
                expected: "solution rows".into(),
            }),
        }
    }

    fn ask(&self, query: &str) -> Result<bool, BackendError> {
        match self.query(query)? {
            QueryResults::Boolean(value) => Ok(value),
            _ => Err(BackendError::UnexpectedResults {
                expected: "boolean".into(),
            }),
        }
    }

    fn construct(&self, query: &str) -> Result<ConstructEvaluation, BackendError> {
        match self.query(query)? {
            QueryResults::Graph(triples) => {
                // Same Send constraint as select: drain before returning.
                let statements: Vec<Result<Statement, BackendError>> = triples
                    .map(|triple| {
                        triple.map_err(|e| BackendError::Evaluation {
                            message: format!("construct error: {e}"),
                        })
                    })
                    .collect();
                Ok(ConstructEvaluation {
                    statements: Box::new(statements.into_iter()),
                })
            }
            _ => Err(BackendError::UnexpectedResults {
                expected: "statements".into(),
            }),
        }
    }

    fn load_turtle(&self, reader: &mut dyn Read) -> Result<(), BackendError> {
        self.store
            .load_from_reader(RdfFormat::Turtle, reader)
            .map_err(|e| BackendError::Io {
                message: format!("failed to load turtle: {e}"),
            })
    }

    fn dump_turtle(&self, writer: &mut dyn Write) -> Result<(), BackendError> {
        self.store
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, RdfFormat::Turtle, writer)
            .map(|_| ())
            .map_err(|e| BackendError::Io {
                message: format!("failed to dump turtle: {e}"),
            })
    }

    fn statements(&self) -> Result<Vec<Statement>, BackendError> {
        self.store
            .iter()
            .map(|quad| {
                quad.map(|q| Statement::new(q.subject, q.predicate, q.object))
                    .map_err(|e| BackendError::Store {
                        message: format!("iteration failed: {e}"),
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for OxigraphBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OxigraphBackend").finish()
    }
}
