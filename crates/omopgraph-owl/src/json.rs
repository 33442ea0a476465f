//! Label-resolved JSON export of a graph.
//!
//! Every handle is replaced by its IRI so the export can be read without the
//! in-memory interner.

use crate::graph::{AnnotationValue, Edge, GraphStats, OntologyGraph, PropertyKind};
use crate::sink::{DocumentSink, SinkError};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentExport {
    pub ontology: String,
    pub namespace: String,
    pub prefix: String,
    pub properties: Vec<PropertyExport>,
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeExport>,
    pub annotations: Vec<AnnotationExport>,
    pub stats: GraphStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyExport {
    pub iri: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeExport {
    SubClassOf {
        sub: String,
        sup: String,
    },
    SomeValuesFrom {
        sub: String,
        property: String,
        filler: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationExport {
    pub subject: String,
    pub property: String,
    /// Literal text, or the target IRI when `is_iri` is set.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub is_iri: bool,
}

impl DocumentExport {
    pub fn from_graph(graph: &OntologyGraph) -> Self {
        let ns = graph.namespace();
        let properties = graph
            .properties()
            .map(|(_, decl)| PropertyExport {
                iri: decl.iri.clone(),
                kind: decl.kind,
            })
            .collect();
        let nodes = graph.nodes().map(|(_, iri)| iri.to_string()).collect();
        let edges = graph
            .edges()
            .iter()
            .map(|edge| match edge {
                Edge::SubClassOf { sub, sup } => EdgeExport::SubClassOf {
                    sub: graph.iri(*sub).to_string(),
                    sup: graph.iri(*sup).to_string(),
                },
                Edge::SomeValuesFrom {
                    sub,
                    property,
                    filler,
                } => EdgeExport::SomeValuesFrom {
                    sub: graph.iri(*sub).to_string(),
                    property: graph.property(*property).iri.clone(),
                    filler: graph.iri(*filler).to_string(),
                },
            })
            .collect();
        let annotations = graph
            .annotations()
            .iter()
            .map(|ann| {
                let (value, language, is_iri) = match &ann.value {
                    AnnotationValue::Literal(lit) => {
                        (lit.lexical.clone(), lit.language.clone(), false)
                    }
                    AnnotationValue::Node(node) => (graph.iri(*node).to_string(), None, true),
                };
                AnnotationExport {
                    subject: graph.iri(ann.subject).to_string(),
                    property: graph.property(ann.property).iri.clone(),
                    value,
                    language,
                    is_iri,
                }
            })
            .collect();

        Self {
            ontology: ns.ontology_iri().to_string(),
            namespace: ns.iri().to_string(),
            prefix: ns.prefix().to_string(),
            properties,
            nodes,
            edges,
            annotations,
            stats: graph.stats(),
        }
    }
}

pub struct JsonSink<W: Write> {
    out: W,
    pretty: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, pretty: true }
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DocumentSink for JsonSink<W> {
    fn write_document(&mut self, graph: &OntologyGraph) -> Result<(), SinkError> {
        let export = DocumentExport::from_graph(graph);
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, &export)?;
        } else {
            serde_json::to_writer(&mut self.out, &export)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
