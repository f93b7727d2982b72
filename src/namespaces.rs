//! Namespace table: abbreviation → IRI mappings, the SPARQL prefix prologue,
//! and query-text normalization.
//!
//! Every query is normalized by prepending the prologue unless it is already
//! present, so logically identical queries always share one cache key. The
//! table also shortens IRIs for log output, mapping a full IRI back to its
//! longest matching `abbrev:rest` form.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::StatementError;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Abbreviation of the local namespace.
pub const LNS_ABBREVIATION: &str = "lns";

/// All namespaces known to the store, keyed by abbreviation.
///
/// A `BTreeMap` keeps the prologue deterministic, which matters because the
/// prologue is part of every cache key.
#[derive(Debug, Clone)]
pub struct Namespaces {
    by_abbreviation: BTreeMap<String, String>,
    prologue: String,
}

impl Namespaces {
    /// Create the default table: rdf, rdfs, owl, xsd plus the configured
    /// local (`lns`) and base (`ns`) namespaces.
    pub fn with_defaults(local_ns: &str, base_ns: &str) -> Self {
        let mut namespaces = Self {
            by_abbreviation: BTreeMap::new(),
            prologue: String::new(),
        };
        namespaces.insert("rdf", RDF_NS);
        namespaces.insert("rdfs", RDFS_NS);
        namespaces.insert("owl", OWL_NS);
        namespaces.insert("xsd", XSD_NS);
        namespaces.insert(LNS_ABBREVIATION, local_ns);
        namespaces.insert("ns", base_ns);
        namespaces
    }

    /// Register or replace a namespace.
    pub fn insert(&mut self, abbreviation: impl Into<String>, namespace: impl Into<String>) {
        self.by_abbreviation
            .insert(abbreviation.into(), namespace.into());
        self.rebuild_prologue();
    }

    /// Remove a namespace, returning its IRI if it was registered.
    pub fn remove(&mut self, abbreviation: &str) -> Option<String> {
        let removed = self.by_abbreviation.remove(abbreviation);
        if removed.is_some() {
            self.rebuild_prologue();
        }
        removed
    }

    pub fn get(&self, abbreviation: &str) -> Option<&str> {
        self.by_abbreviation.get(abbreviation).map(String::as_str)
    }

    /// All registered namespaces, keyed by abbreviation.
    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.by_abbreviation
    }

    /// The `PREFIX` prologue prepended to every normalized query.
    pub fn prologue(&self) -> &str {
        &self.prologue
    }

    /// Normalize query text by prepending the prologue if not already present.
    pub fn normalize(&self, query: &str) -> Arc<str> {
        if query.starts_with(&self.prologue) {
            Arc::from(query)
        } else {
            Arc::from(format!("{}{}", self.prologue, query))
        }
    }

    /// Expand a prefixed name like `ex:a` to a full IRI.
    ///
    /// Text that does not look like a prefixed name with a registered prefix
    /// is returned unchanged (it is assumed to already be absolute).
    pub fn expand(&self, name: &str) -> Result<String, StatementError> {
        match name.split_once(':') {
            Some((prefix, local)) if !local.starts_with("//") => {
                match self.by_abbreviation.get(prefix) {
                    Some(namespace) => Ok(format!("{namespace}{local}")),
                    None => Err(StatementError::UnknownPrefix {
                        prefix: prefix.into(),
                    }),
                }
            }
            _ => Ok(name.to_owned()),
        }
    }

    /// Shorten an IRI to `abbrev:rest` using the longest matching namespace.
    /// Returns the full IRI if no namespace matches.
    pub fn shorten(&self, iri: &str) -> String {
        let mut best: Option<(&str, &str)> = None;
        for (abbreviation, namespace) in &self.by_abbreviation {
            if iri.len() > namespace.len()
                && iri.starts_with(namespace.as_str())
                && best.is_none_or(|(_, ns)| namespace.len() > ns.len())
            {
                best = Some((abbreviation, namespace));
            }
        }
        match best {
            Some((abbreviation, namespace)) => {
                format!("{abbreviation}:{}", &iri[namespace.len()..])
            }
            None => iri.to_owned(),
        }
    }

    fn rebuild_prologue(&mut self) {
        let mut prologue = String::new();
        for (abbreviation, namespace) in &self.by_abbreviation {
            prologue.push_str("PREFIX ");
            prologue.push_str(abbreviation);
            prologue.push_str(": <");
            prologue.push_str(namespace);
            prologue.push_str(">\n");
        }
        self.prologue = prologue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Namespaces {
        Namespaces::with_defaults("http://wiki.local/page#", "http://wiki.local/ontology#")
    }

    #[test]
    fn normalization_is_idempotent() {
        let ns = table();
        let once = ns.normalize("ASK { ?s ?p ?o }");
        let twice = ns.normalize(&once);
        assert_eq!(once, twice);
        assert!(once.starts_with("PREFIX "));
        assert!(once.ends_with("ASK { ?s ?p ?o }"));
    }

    #[test]
    fn expand_prefixed_name() {
        let mut ns = table();
        ns.insert("ex", "http://example.org/");
        assert_eq!(ns.expand("ex:a").unwrap(), "http://example.org/a");
        assert_eq!(ns.expand("http://example.org/a").unwrap(), "http://example.org/a");
        assert!(matches!(
            ns.expand("nope:a"),
            Err(StatementError::UnknownPrefix { .. })
        ));
    }

    #[test]
    fn shorten_picks_longest_match() {
        let mut ns = table();
        ns.insert("ex", "http://example.org/");
        ns.insert("exsub", "http://example.org/sub/");
        assert_eq!(ns.shorten("http://example.org/sub/a"), "exsub:a");
        assert_eq!(ns.shorten("http://example.org/a"), "ex:a");
        assert_eq!(ns.shorten("http://other.org/a"), "http://other.org/a");
    }

    #[test]
    fn removing_a_namespace_changes_the_prologue() {
        let mut ns = table();
        ns.insert("ex", "http://example.org/");
        assert!(ns.prologue().contains("PREFIX ex:"));
        assert_eq!(ns.remove("ex").unwrap(), "http://example.org/");
        assert!(!ns.prologue().contains("PREFIX ex:"));
    }
}
