//! Pipeline configuration.
//!
//! All knobs of a run live here: namespace, vocabulary scope, batch sizes and
//! the declarative rule tables the concept stage interprets. Every field has
//! a default, so a JSON file only needs to name what it overrides.

use crate::error::{PipelineError, Result};
use omopgraph_owl::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const VOCABULARY_TABLE: &str = "VOCABULARY.csv";
pub const DOMAIN_TABLE: &str = "DOMAIN.csv";
pub const CONCEPT_CLASS_TABLE: &str = "CONCEPT_CLASS.csv";
pub const RELATIONSHIP_TABLE: &str = "RELATIONSHIP.csv";
pub const CONCEPT_TABLE: &str = "CONCEPT.csv";
pub const CONCEPT_ANCESTOR_TABLE: &str = "CONCEPT_ANCESTOR.csv";
pub const CONCEPT_RELATIONSHIP_TABLE: &str = "CONCEPT_RELATIONSHIP.csv";
pub const CONCEPT_SYNONYM_TABLE: &str = "CONCEPT_SYNONYM.csv";

/// Every table a full run reads.
pub const REQUIRED_TABLES: [&str; 8] = [
    VOCABULARY_TABLE,
    DOMAIN_TABLE,
    CONCEPT_CLASS_TABLE,
    RELATIONSHIP_TABLE,
    CONCEPT_TABLE,
    CONCEPT_ANCESTOR_TABLE,
    CONCEPT_RELATIONSHIP_TABLE,
    CONCEPT_SYNONYM_TABLE,
];

pub const DEFAULT_NAMESPACE: &str = "https://athena.ohdsi.org/search-terms/terms/omop#";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// `language_concept_id` of English.
pub const ENGLISH_LANGUAGE_CONCEPT: &str = "4180186";

/// One reference table: rows become nodes under a category root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub category: String,
    pub table: String,
    /// Numeric concept id of the row, kept as an annotation.
    pub id_column: String,
    pub label_column: String,
    /// Row key; later tables reference rows by this value.
    pub key_column: String,
}

impl ReferenceTable {
    fn new(category: &str, table: &str, id: &str, label: &str, key: &str) -> Self {
        Self {
            category: category.to_string(),
            table: table.to_string(),
            id_column: id.to_string(),
            label_column: label.to_string(),
            key_column: key.to_string(),
        }
    }
}

/// `(annotation name, source column)`: copy a non-blank column value onto the
/// concept as a literal annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRule {
    pub name: String,
    pub source_column: String,
}

/// `(property name, source column, lookup category)`: resolve the column value
/// in a reference lookup and assert `concept ⊑ ∃property.target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRule {
    pub name: String,
    pub source_column: String,
    pub lookup: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub namespace: String,
    pub prefix: String,
    /// Vocabularies whose concepts enter the graph; everything else is invisible.
    pub target_vocabularies: Vec<String>,
    pub chunk_size: usize,
    /// Per-table batch size overrides, keyed by table file name.
    pub chunk_sizes: BTreeMap<String, usize>,
    /// Processed in this order.
    pub reference_tables: Vec<ReferenceTable>,
    pub annotation_rules: Vec<AnnotationRule>,
    pub property_rules: Vec<PropertyRule>,
    /// Annotation holding `{vocabulary}:{concept_code}`.
    pub code_property: String,
    /// Annotation holding a reference row's id column.
    pub source_id_property: String,
    pub label_language: String,
    pub synonym_language: String,
    pub relationship_id: String,
    pub parallel_rows: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            prefix: "omop".to_string(),
            target_vocabularies: ["SNOMED", "HemOnc", "ICDO3", "Cancer Modifier"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_sizes: BTreeMap::new(),
            reference_tables: vec![
                ReferenceTable::new(
                    "domain",
                    DOMAIN_TABLE,
                    "domain_concept_id",
                    "domain_name",
                    "domain_id",
                ),
                ReferenceTable::new(
                    "concept_class",
                    CONCEPT_CLASS_TABLE,
                    "concept_class_concept_id",
                    "concept_class_name",
                    "concept_class_id",
                ),
                ReferenceTable::new(
                    "relationship",
                    RELATIONSHIP_TABLE,
                    "relationship_concept_id",
                    "relationship_name",
                    "relationship_id",
                ),
                ReferenceTable::new(
                    "vocabulary",
                    VOCABULARY_TABLE,
                    "vocabulary_concept_id",
                    "vocabulary_name",
                    "vocabulary_id",
                ),
            ],
            annotation_rules: vec![
                AnnotationRule {
                    name: "invalid".to_string(),
                    source_column: "invalid_reason".to_string(),
                },
                AnnotationRule {
                    name: "standard_concept".to_string(),
                    source_column: "standard_concept".to_string(),
                },
            ],
            property_rules: vec![
                PropertyRule {
                    name: "in_domain".to_string(),
                    source_column: "domain_id".to_string(),
                    lookup: "domain".to_string(),
                },
                PropertyRule {
                    name: "in_class".to_string(),
                    source_column: "concept_class_id".to_string(),
                    lookup: "concept_class".to_string(),
                },
                PropertyRule {
                    name: "in_vocabulary".to_string(),
                    source_column: "vocabulary_id".to_string(),
                    lookup: "vocabulary".to_string(),
                },
            ],
            code_property: "has_code".to_string(),
            source_id_property: "omop_concept_id".to_string(),
            label_language: "en".to_string(),
            synonym_language: ENGLISH_LANGUAGE_CONCEPT.to_string(),
            relationship_id: "Maps to".to_string(),
            parallel_rows: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            table: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Batch size for `table`, honouring per-table overrides.
    pub fn chunk_size_for(&self, table: &str) -> usize {
        self.chunk_sizes
            .get(table)
            .copied()
            .unwrap_or(self.chunk_size)
    }

    pub fn namespace(&self) -> Result<Namespace> {
        Ok(Namespace::new(self.namespace.clone(), self.prefix.clone())?)
    }

    pub fn validate(&self) -> Result<()> {
        self.namespace()?;

        if self.target_vocabularies.is_empty() {
            return Err(PipelineError::Config(
                "target_vocabularies must name at least one vocabulary".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be positive".to_string()));
        }
        if let Some((table, _)) = self.chunk_sizes.iter().find(|(_, size)| **size == 0) {
            return Err(PipelineError::Config(format!(
                "chunk size for `{table}` must be positive"
            )));
        }

        let mut categories: Vec<&str> = Vec::new();
        for reference in &self.reference_tables {
            if categories.contains(&reference.category.as_str()) {
                return Err(PipelineError::Config(format!(
                    "reference category `{}` declared twice",
                    reference.category
                )));
            }
            categories.push(&reference.category);
        }
        for rule in &self.property_rules {
            if !categories.contains(&rule.lookup.as_str()) {
                return Err(PipelineError::Config(format!(
                    "property rule `{}` targets unknown lookup `{}`",
                    rule.name, rule.lookup
                )));
            }
        }
        Ok(())
    }
}
