//! Direct subsumption index for downward traversal.
//!
//! Built once from a finished graph. Only asserted `SubClassOf` edges are
//! indexed; no transitive closure is computed.

use crate::graph::{AnnotationValue, Edge, NodeId, OntologyGraph};
use ahash::{AHashMap, AHashSet};

#[derive(Debug, Default)]
pub struct Hierarchy {
    parents: AHashMap<NodeId, Vec<NodeId>>,
    children: AHashMap<NodeId, Vec<NodeId>>,
    labels: AHashMap<NodeId, String>,
}

impl Hierarchy {
    pub fn build(graph: &OntologyGraph) -> Self {
        let mut out = Self::default();
        for edge in graph.edges() {
            if let Edge::SubClassOf { sub, sup } = edge {
                out.parents.entry(*sub).or_default().push(*sup);
                out.children.entry(*sup).or_default().push(*sub);
            }
        }

        let label = graph.label_property();
        for ann in graph.annotations() {
            if ann.property != label {
                continue;
            }
            if let AnnotationValue::Literal(lit) = &ann.value {
                out.labels
                    .entry(ann.subject)
                    .or_insert_with(|| lit.lexical.clone());
            }
        }

        for list in out.children.values_mut() {
            list.sort();
            list.dedup();
        }
        for list in out.parents.values_mut() {
            list.sort();
            list.dedup();
        }
        out
    }

    pub fn parents(&self, node: NodeId) -> &[NodeId] {
        self.parents.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First `rdfs:label` asserted on `node`.
    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.labels.get(&node).map(String::as_str)
    }

    /// Members of `nodes` with no asserted superclass, sorted by id. A node
    /// with no edges at all is its own root.
    pub fn roots<I>(&self, nodes: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut roots: Vec<NodeId> = nodes
            .into_iter()
            .filter(|n| !self.parents.contains_key(n))
            .collect();
        roots.sort();
        roots.dedup();
        roots
    }

    /// Depth-first walk below `root`, visiting each node at most once.
    ///
    /// `visit` receives the node and its depth (root = 0). Children deeper
    /// than `max_depth` are not visited.
    pub fn walk<F>(&self, root: NodeId, max_depth: Option<usize>, mut visit: F)
    where
        F: FnMut(NodeId, usize),
    {
        let mut seen: AHashSet<NodeId> = AHashSet::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some((node, depth)) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            visit(node, depth);
            if max_depth.map(|max| depth >= max).unwrap_or(false) {
                continue;
            }
            for child in self.children(node).iter().rev() {
                if !seen.contains(child) {
                    stack.push((*child, depth + 1));
                }
            }
        }
    }
}
