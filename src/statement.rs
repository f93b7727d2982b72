//! Statement and provenance-source types.
//!
//! A [`Statement`] is an immutable (subject, predicate, object) triple with
//! value equality and hashing; we reuse the backend's triple model directly.
//! A [`StatementSource`] identifies *who* asserted a statement, so retraction
//! can be scoped to a single producer without touching statements that other
//! producers still assert.

use std::fmt;

use oxigraph::model::{Literal, NamedNode, Term};
use serde::{Deserialize, Serialize};

use crate::error::StatementError;

/// An immutable (subject, predicate, object) triple.
///
/// Compared and hashed by value; created by callers and never mutated.
pub type Statement = oxigraph::model::Triple;

/// Build a statement from three absolute IRIs.
///
/// For prefixed names like `ex:a`, use `SemanticCore::create_statement`,
/// which expands them against the store's namespace table.
pub fn iri_statement(
    subject: &str,
    predicate: &str,
    object: &str,
) -> Result<Statement, StatementError> {
    Ok(Statement::new(
        parse_iri(subject)?,
        parse_iri(predicate)?,
        parse_iri(object)?,
    ))
}

/// Build a statement whose object is a literal term.
pub fn literal_statement(
    subject: &str,
    predicate: &str,
    object: Term,
) -> Result<Statement, StatementError> {
    Ok(Statement::new(
        parse_iri(subject)?,
        parse_iri(predicate)?,
        object,
    ))
}

/// A plain `xsd:string` literal term.
pub fn plain_literal(value: impl Into<String>) -> Term {
    Literal::new_simple_literal(value.into()).into()
}

/// A literal term with an explicit datatype IRI.
pub fn typed_literal(value: impl Into<String>, datatype: &str) -> Result<Term, StatementError> {
    Ok(Literal::new_typed_literal(value.into(), parse_iri(datatype)?).into())
}

/// A language-tagged literal term (`"value"@tag`).
pub fn language_literal(value: impl Into<String>, language: &str) -> Result<Term, StatementError> {
    Literal::new_language_tagged_literal(value.into(), language)
        .map(Term::from)
        .map_err(|_| StatementError::InvalidLanguageTag {
            tag: language.into(),
        })
}

pub(crate) fn parse_iri(iri: &str) -> Result<NamedNode, StatementError> {
    NamedNode::new(iri).map_err(|_| StatementError::InvalidIri { iri: iri.into() })
}

/// The producer identity a statement was asserted under.
///
/// Sources are compared by identity value, never by the statements they
/// currently hold. Statements asserted without any source (the caller takes
/// full responsibility for their later removal) bypass this type entirely via
/// `SemanticCore::assert_unsourced` and `SemanticCore::retract`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementSource {
    /// Tied to one node of a compiled document (fine-grained).
    Section { section_id: String },
    /// Tied to one compilation unit as a whole.
    Compiler { compiler_id: String },
}

impl StatementSource {
    /// Source for a single node of a compiled document.
    pub fn section(section_id: impl Into<String>) -> Self {
        Self::Section {
            section_id: section_id.into(),
        }
    }

    /// Source for a whole compilation unit.
    pub fn compiler(compiler_id: impl Into<String>) -> Self {
        Self::Compiler {
            compiler_id: compiler_id.into(),
        }
    }
}

impl fmt::Display for StatementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section { section_id } => write!(f, "section:{section_id}"),
            Self::Compiler { compiler_id } => write!(f, "compiler:{compiler_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_compare_by_value() {
        let a = iri_statement("http://ex.org/a", "http://ex.org/p", "http://ex.org/b").unwrap();
        let b = iri_statement("http://ex.org/a", "http://ex.org/p", "http://ex.org/b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_iri_is_rejected() {
        let result = iri_statement("not an iri", "http://ex.org/p", "http://ex.org/b");
        assert!(matches!(result, Err(StatementError::InvalidIri { .. })));
    }

    #[test]
    fn literal_objects_round_trip_their_lexical_form() {
        let plain = literal_statement("http://ex.org/a", "http://ex.org/p", plain_literal("42"))
            .unwrap();
        assert_eq!(plain.object.to_string(), "\"42\"");

        let typed = typed_literal("42", "http://www.w3.org/2001/XMLSchema#integer").unwrap();
        assert_eq!(
            typed.to_string(),
            "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );

        let tagged = language_literal("hallo", "de").unwrap();
        assert_eq!(tagged.to_string(), "\"hallo\"@de");
    }

    #[test]
    fn invalid_language_tag_is_rejected() {
        assert!(matches!(
            language_literal("hallo", "not a tag"),
            Err(StatementError::InvalidLanguageTag { .. })
        ));
    }

    #[test]
    fn sources_compare_by_identity_value() {
        assert_eq!(StatementSource::section("n1"), StatementSource::section("n1"));
        assert_ne!(StatementSource::section("n1"), StatementSource::section("n2"));
        assert_ne!(
            StatementSource::section("n1"),
            StatementSource::compiler("n1")
        );
    }
}
