//! Class-graph document model for omopgraph.
//!
//! This crate holds the graph that the ingestion pipeline compiles into:
//!
//! - **Nodes** are OWL classes, interned by IRI and addressed by [`NodeId`].
//! - **Edges** are direct subsumption (`rdfs:subClassOf`) or restricted
//!   subsumption through an existential restriction on an object property.
//! - **Annotations** attach literals (labels, codes, flags) or node references
//!   (cross-mappings) to a node.
//!
//! Nothing here performs inference. The graph records exactly the edges it is
//! given; closure and satisfiability belong to downstream reasoners.
//!
//! Serialization is behind the [`DocumentSink`] trait. Two encoders ship with
//! the crate: OWL-in-Turtle ([`TurtleSink`]) and a JSON export of the same
//! content ([`JsonSink`]). [`FileSink`] wraps either one and only moves the
//! finished document into place once every byte has been written.

pub mod graph;
pub mod hierarchy;
pub mod iri;
pub mod json;
pub mod sink;
pub mod turtle;

pub use graph::{
    Annotation, AnnotationValue, Edge, GraphStats, Literal, NodeId, OntologyGraph, PropertyDecl,
    PropertyId, PropertyKind,
};
pub use hierarchy::Hierarchy;
pub use iri::{encode_key, vocabulary_key, Namespace};
pub use json::{DocumentExport, JsonSink};
pub use sink::{DocumentFormat, DocumentSink, FileSink, SinkError};
pub use turtle::TurtleSink;

#[derive(Debug, thiserror::Error)]
pub enum OwlError {
    #[error("invalid namespace IRI `{0}`: must be absolute and end with `#` or `/`")]
    InvalidNamespace(String),
    #[error("invalid namespace prefix `{0}`")]
    InvalidPrefix(String),
    #[error("property `{iri}` already declared as {existing:?}, cannot redeclare as {requested:?}")]
    PropertyKindConflict {
        iri: String,
        existing: PropertyKind,
        requested: PropertyKind,
    },
}
