//! Reference-category lookup tables and the concept index.
//!
//! Both are owned by the pipeline and lent to builders: the reference stage
//! and the concept stage hold the only mutable borrows, every later stage
//! reads through a shared one.

use ahash::AHashMap;
use omopgraph_owl::NodeId;

/// Rows of one reference category, keyed by the row key column.
#[derive(Debug, Clone)]
pub struct CategoryLookup {
    root: NodeId,
    entries: AHashMap<String, NodeId>,
}

impl CategoryLookup {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// category name → (row key → node)
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    categories: AHashMap<String, CategoryLookup>,
    order: Vec<String>,
}

impl LookupTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category with its root node. Re-registering keeps entries.
    pub fn insert_category(&mut self, category: &str, root: NodeId) {
        if !self.categories.contains_key(category) {
            self.order.push(category.to_string());
        }
        self.categories
            .entry(category.to_string())
            .or_insert_with(|| CategoryLookup {
                root,
                entries: AHashMap::new(),
            });
    }

    /// Returns `false` if the category is unknown or the key already exists.
    pub fn insert(&mut self, category: &str, key: &str, node: NodeId) -> bool {
        match self.categories.get_mut(category) {
            Some(lookup) if !lookup.entries.contains_key(key) => {
                lookup.entries.insert(key.to_string(), node);
                true
            }
            _ => false,
        }
    }

    pub fn category(&self, category: &str) -> Option<&CategoryLookup> {
        self.categories.get(category)
    }

    pub fn get(&self, category: &str, key: &str) -> Option<NodeId> {
        self.categories.get(category)?.get(key)
    }

    /// Category names in registration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }
}

/// concept source identifier → node
///
/// A miss means the concept was filtered out (or not indexed yet); callers
/// skip the referencing row.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    by_id: AHashMap<String, NodeId>,
}

impl ConceptIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `concept_id`. Last write wins; the displaced node is returned.
    pub fn insert(&mut self, concept_id: &str, node: NodeId) -> Option<NodeId> {
        if let Some(slot) = self.by_id.get_mut(concept_id) {
            return Some(std::mem::replace(slot, node));
        }
        self.by_id.insert(concept_id.to_string(), node);
        None
    }

    pub fn lookup(&self, concept_id: &str) -> Option<NodeId> {
        self.by_id.get(concept_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Indexed nodes, sorted by id. A node displaced by a later write is not
    /// included.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.by_id.values().copied().collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }
}
