//! Provenance ledger: a bidirectional many-to-many relation between
//! statement sources and statements.
//!
//! A statement is logically "live" while at least one source still links to
//! it. The same statement may be asserted by many sources simultaneously;
//! unlinking one source never affects a statement still linked to another.
//! Both index directions are mutated together inside every operation, so they
//! can never drift apart. Only the ledger operations are exposed, never the
//! raw indices.

use std::collections::{HashMap, HashSet};

use crate::statement::{Statement, StatementSource};

/// Bidirectional source ↔ statement index.
///
/// Not internally synchronized: the owning store serializes mutations behind
/// its own lock.
#[derive(Debug, Default)]
pub struct ProvenanceLedger {
    by_source: HashMap<StatementSource, HashSet<Statement>>,
    by_statement: HashMap<Statement, HashSet<StatementSource>>,
}

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a (source, statement) link. Idempotent per pair.
    pub fn record(&mut self, source: StatementSource, statement: Statement) {
        self.by_source
            .entry(source.clone())
            .or_default()
            .insert(statement.clone());
        self.by_statement.entry(statement).or_default().insert(source);
    }

    /// Whether the statement is linked to at least one source.
    pub fn is_linked(&self, statement: &Statement) -> bool {
        self.by_statement.contains_key(statement)
    }

    /// The statements currently linked to the given source.
    pub fn statements_of(&self, source: &StatementSource) -> Vec<Statement> {
        self.by_source
            .get(source)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The sources currently linked to the given statement.
    pub fn sources_of(&self, statement: &Statement) -> Vec<StatementSource> {
        self.by_statement
            .get(statement)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every link of the given source.
    ///
    /// Returns the statements that were left with zero remaining links, i.e.
    /// the ones that are no longer live. Unlinking an unknown source is a
    /// legal no-op that returns nothing.
    pub fn unlink_source(&mut self, source: &StatementSource) -> Vec<Statement> {
        let Some(statements) = self.by_source.remove(source) else {
            return Vec::new();
        };
        let mut orphaned = Vec::new();
        for statement in statements {
            if let Some(sources) = self.by_statement.get_mut(&statement) {
                sources.remove(source);
                if sources.is_empty() {
                    self.by_statement.remove(&statement);
                    orphaned.push(statement);
                }
            }
        }
        orphaned
    }

    /// Drop every link and return all statements that were live.
    pub fn drain(&mut self) -> Vec<Statement> {
        self.by_source.clear();
        self.by_statement.drain().map(|(statement, _)| statement).collect()
    }

    /// True until the first link is recorded.
    pub fn is_empty(&self) -> bool {
        self.by_statement.is_empty()
    }

    /// Number of live statements.
    pub fn len(&self) -> usize {
        self.by_statement.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::iri_statement;

    fn st(name: &str) -> Statement {
        iri_statement(
            &format!("http://ex.org/{name}"),
            "http://ex.org/p",
            "http://ex.org/o",
        )
        .unwrap()
    }

    #[test]
    fn statement_stays_live_while_one_source_remains() {
        let mut ledger = ProvenanceLedger::new();
        let shared = st("shared");
        let a = StatementSource::section("a");
        let b = StatementSource::section("b");

        ledger.record(a.clone(), shared.clone());
        ledger.record(b.clone(), shared.clone());

        assert!(ledger.unlink_source(&a).is_empty());
        assert!(ledger.is_linked(&shared));

        let orphaned = ledger.unlink_source(&b);
        assert_eq!(orphaned, vec![shared.clone()]);
        assert!(!ledger.is_linked(&shared));
    }

    #[test]
    fn unlink_unknown_source_is_a_noop() {
        let mut ledger = ProvenanceLedger::new();
        assert!(ledger.unlink_source(&StatementSource::section("ghost")).is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn record_is_idempotent_per_pair() {
        let mut ledger = ProvenanceLedger::new();
        let s = st("s");
        let src = StatementSource::compiler("c");
        ledger.record(src.clone(), s.clone());
        ledger.record(src.clone(), s.clone());

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.statements_of(&src).len(), 1);
        assert_eq!(ledger.unlink_source(&src), vec![s]);
    }

    #[test]
    fn sources_of_reports_every_producer() {
        let mut ledger = ProvenanceLedger::new();
        let s = st("s");
        ledger.record(StatementSource::section("n1"), s.clone());
        ledger.record(StatementSource::compiler("c1"), s.clone());

        let mut sources = ledger.sources_of(&s);
        sources.sort_by_key(|s| s.to_string());
        assert_eq!(
            sources,
            vec![StatementSource::compiler("c1"), StatementSource::section("n1")]
        );
    }

    #[test]
    fn drain_returns_all_live_statements() {
        let mut ledger = ProvenanceLedger::new();
        ledger.record(StatementSource::section("n1"), st("one"));
        ledger.record(StatementSource::section("n2"), st("two"));

        let drained = ledger.drain();
        assert_eq!(drained.len(), 2);
        assert!(ledger.is_empty());
    }
}
