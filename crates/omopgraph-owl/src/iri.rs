//! Namespaces and deterministic IRI derivation.
//!
//! Every node IRI is a pure function of the namespace, a category name, and a
//! source key. Keys are percent-encoded byte-wise so that two distinct keys can
//! never map onto the same IRI.

use crate::OwlError;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
pub const SKOS_EXACT_MATCH: &str = "http://www.w3.org/2004/02/skos/core#exactMatch";

/// Well-known prefixes emitted in every document, in declaration order.
pub const STANDARD_PREFIXES: [(&str, &str); 4] = [
    ("rdf", RDF_NS),
    ("rdfs", RDFS_NS),
    ("owl", OWL_NS),
    ("skos", SKOS_NS),
];

/// The root namespace of a compiled graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    iri: String,
    prefix: String,
}

impl Namespace {
    pub fn new(iri: impl Into<String>, prefix: impl Into<String>) -> Result<Self, OwlError> {
        let iri = iri.into();
        let prefix = prefix.into();

        let has_scheme = iri
            .split_once(':')
            .map(|(scheme, _)| {
                !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
            })
            .unwrap_or(false);
        let has_terminator = iri.ends_with('#') || iri.ends_with('/');
        let has_bad_char = iri
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'));
        if !has_scheme || !has_terminator || has_bad_char {
            return Err(OwlError::InvalidNamespace(iri));
        }

        let valid_prefix = prefix
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
            && prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_prefix || STANDARD_PREFIXES.iter().any(|(p, _)| *p == prefix) {
            return Err(OwlError::InvalidPrefix(prefix));
        }

        Ok(Self { iri, prefix })
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// IRI of the ontology document itself (the namespace without its terminator).
    pub fn ontology_iri(&self) -> &str {
        self.iri.trim_end_matches(['#', '/'])
    }

    /// A term directly under the namespace; `local` is encoded.
    pub fn term(&self, local: &str) -> String {
        format!("{}{}", self.iri, encode_key(local))
    }

    /// Node IRI of a concept, keyed by its source identifier alone.
    pub fn concept_iri(&self, concept_id: &str) -> String {
        self.term(concept_id)
    }

    /// Root node IRI of a reference category (`domain`, `vocabulary`, ...).
    pub fn category_iri(&self, category: &str) -> String {
        self.term(category)
    }

    /// Node IRI of one reference-table row within its category.
    pub fn reference_iri(&self, category: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.iri,
            encode_key(category),
            encode_key(key)
        )
    }

    /// The local part of `iri` if it lives under this namespace.
    pub fn local_part<'a>(&self, iri: &'a str) -> Option<&'a str> {
        iri.strip_prefix(self.iri.as_str())
    }
}

/// RFC 3986 unreserved characters pass through; every other byte is encoded.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode every byte outside the RFC 3986 unreserved set.
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// Lowercase a vocabulary identifier and replace spaces with `_`.
///
/// Used as the left half of a code mapping (`cancer_modifier:c4.1`).
pub fn vocabulary_key(vocabulary_id: &str) -> String {
    vocabulary_id.replace(' ', "_").to_lowercase()
}
