//! The in-memory class graph.
//!
//! Nodes and properties are interned: the first request for an IRI creates
//! the entity, every later request returns the same handle. Handles are never
//! invalidated and a node's IRI never changes once created.

use crate::iri::{Namespace, RDFS_LABEL, SKOS_ALT_LABEL, SKOS_EXACT_MATCH};
use crate::OwlError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Handles
// ============================================================================

/// Handle to a node (OWL class) in an [`OntologyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a declared property in an [`OntologyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PropertyId(u32);

impl PropertyId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// Graph content
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Object,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub iri: String,
    pub kind: PropertyKind,
    /// Built-in vocabulary terms (`rdfs:label`) need no declaration axiom.
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub language: Option<String>,
}

impl Literal {
    pub fn plain(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValue {
    Literal(Literal),
    Node(NodeId),
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// `sub rdfs:subClassOf sup`
    SubClassOf { sub: NodeId, sup: NodeId },
    /// `sub rdfs:subClassOf (property some filler)`
    SomeValuesFrom {
        sub: NodeId,
        property: PropertyId,
        filler: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub subject: NodeId,
    pub property: PropertyId,
    pub value: AnnotationValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub properties: usize,
    pub subclass_edges: usize,
    pub restriction_edges: usize,
    pub annotations: usize,
}

// ============================================================================
// OntologyGraph
// ============================================================================

/// A class graph rooted in one namespace.
#[derive(Debug)]
pub struct OntologyGraph {
    namespace: Namespace,
    nodes: Vec<Arc<str>>,
    node_by_iri: AHashMap<Arc<str>, NodeId>,
    properties: Vec<PropertyDecl>,
    property_by_iri: AHashMap<String, PropertyId>,
    edges: Vec<Edge>,
    annotations: Vec<Annotation>,
    label: PropertyId,
    alt_label: PropertyId,
    exact_match: PropertyId,
}

impl OntologyGraph {
    pub fn new(namespace: Namespace) -> Self {
        let mut graph = Self {
            namespace,
            nodes: Vec::new(),
            node_by_iri: AHashMap::new(),
            properties: Vec::new(),
            property_by_iri: AHashMap::new(),
            edges: Vec::new(),
            annotations: Vec::new(),
            label: PropertyId(0),
            alt_label: PropertyId(0),
            exact_match: PropertyId(0),
        };
        graph.label = graph.push_property(RDFS_LABEL.to_string(), PropertyKind::Annotation, true);
        graph.alt_label =
            graph.push_property(SKOS_ALT_LABEL.to_string(), PropertyKind::Annotation, false);
        graph.exact_match =
            graph.push_property(SKOS_EXACT_MATCH.to_string(), PropertyKind::Annotation, false);
        graph
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    /// Get or create the node for `iri`.
    pub fn class(&mut self, iri: &str) -> NodeId {
        if let Some(id) = self.node_by_iri.get(iri) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        let shared: Arc<str> = Arc::from(iri);
        self.nodes.push(Arc::clone(&shared));
        self.node_by_iri.insert(shared, id);
        id
    }

    /// Look up an existing node without creating it.
    pub fn node(&self, iri: &str) -> Option<NodeId> {
        self.node_by_iri.get(iri).copied()
    }

    pub fn iri(&self, node: NodeId) -> &str {
        &self.nodes[node.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, iri)| (NodeId(i as u32), iri.as_ref()))
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn push_property(&mut self, iri: String, kind: PropertyKind, builtin: bool) -> PropertyId {
        let id = PropertyId(self.properties.len() as u32);
        self.property_by_iri.insert(iri.clone(), id);
        self.properties.push(PropertyDecl { iri, kind, builtin });
        id
    }

    /// Get or declare a property by full IRI.
    pub fn declare_property(&mut self, iri: &str, kind: PropertyKind) -> Result<PropertyId, OwlError> {
        if let Some(id) = self.property_by_iri.get(iri) {
            let existing = self.properties[id.index()].kind;
            if existing != kind {
                return Err(OwlError::PropertyKindConflict {
                    iri: iri.to_string(),
                    existing,
                    requested: kind,
                });
            }
            return Ok(*id);
        }
        Ok(self.push_property(iri.to_string(), kind, false))
    }

    /// Get or declare an object property under the graph namespace.
    pub fn object_property(&mut self, name: &str) -> Result<PropertyId, OwlError> {
        let iri = self.namespace.term(name);
        self.declare_property(&iri, PropertyKind::Object)
    }

    /// Get or declare an annotation property under the graph namespace.
    pub fn annotation_property(&mut self, name: &str) -> Result<PropertyId, OwlError> {
        let iri = self.namespace.term(name);
        self.declare_property(&iri, PropertyKind::Annotation)
    }

    pub fn property(&self, id: PropertyId) -> &PropertyDecl {
        &self.properties[id.index()]
    }

    pub fn property_by_iri(&self, iri: &str) -> Option<PropertyId> {
        self.property_by_iri.get(iri).copied()
    }

    pub fn properties(&self) -> impl Iterator<Item = (PropertyId, &PropertyDecl)> + '_ {
        self.properties
            .iter()
            .enumerate()
            .map(|(i, decl)| (PropertyId(i as u32), decl))
    }

    /// `rdfs:label`
    pub fn label_property(&self) -> PropertyId {
        self.label
    }

    /// `skos:altLabel`
    pub fn alt_label_property(&self) -> PropertyId {
        self.alt_label
    }

    /// `skos:exactMatch`
    pub fn exact_match_property(&self) -> PropertyId {
        self.exact_match
    }

    // ------------------------------------------------------------------------
    // Edges and annotations
    // ------------------------------------------------------------------------

    pub fn add_subclass(&mut self, sub: NodeId, sup: NodeId) {
        self.edges.push(Edge::SubClassOf { sub, sup });
    }

    pub fn add_some_values_from(&mut self, sub: NodeId, property: PropertyId, filler: NodeId) {
        self.edges.push(Edge::SomeValuesFrom {
            sub,
            property,
            filler,
        });
    }

    pub fn annotate(&mut self, subject: NodeId, property: PropertyId, value: AnnotationValue) {
        self.annotations.push(Annotation {
            subject,
            property,
            value,
        });
    }

    pub fn annotate_literal(&mut self, subject: NodeId, property: PropertyId, literal: Literal) {
        self.annotate(subject, property, AnnotationValue::Literal(literal));
    }

    pub fn add_label(&mut self, subject: NodeId, text: &str, language: Option<&str>) {
        let literal = Literal {
            lexical: text.to_string(),
            language: language.map(str::to_string),
        };
        self.annotate_literal(subject, self.label, literal);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    // ------------------------------------------------------------------------
    // Queries (linear scans; use `Hierarchy` for repeated traversal)
    // ------------------------------------------------------------------------

    pub fn annotations_of(&self, node: NodeId) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter().filter(move |a| a.subject == node)
    }

    /// Literal values of `property` on `node`, in insertion order.
    pub fn literals(&self, node: NodeId, property: PropertyId) -> Vec<&str> {
        self.annotations_of(node)
            .filter(|a| a.property == property)
            .filter_map(|a| match &a.value {
                AnnotationValue::Literal(lit) => Some(lit.lexical.as_str()),
                AnnotationValue::Node(_) => None,
            })
            .collect()
    }

    pub fn labels(&self, node: NodeId) -> Vec<&str> {
        self.literals(node, self.label)
    }

    /// Direct (asserted) superclasses of `node`.
    pub fn superclasses(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter_map(|e| match e {
                Edge::SubClassOf { sub, sup } if *sub == node => Some(*sup),
                _ => None,
            })
            .collect()
    }

    /// Existential restrictions asserted on `node` as `(property, filler)`.
    pub fn restrictions(&self, node: NodeId) -> Vec<(PropertyId, NodeId)> {
        self.edges
            .iter()
            .filter_map(|e| match e {
                Edge::SomeValuesFrom {
                    sub,
                    property,
                    filler,
                } if *sub == node => Some((*property, *filler)),
                _ => None,
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let subclass_edges = self
            .edges
            .iter()
            .filter(|e| matches!(e, Edge::SubClassOf { .. }))
            .count();
        GraphStats {
            nodes: self.nodes.len(),
            properties: self.properties.len(),
            subclass_edges,
            restriction_edges: self.edges.len() - subclass_edges,
            annotations: self.annotations.len(),
        }
    }
}
