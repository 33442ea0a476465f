//! OMOP vocabulary ingestion for omopgraph.
//!
//! Compiles the delimited tables of an OMOP vocabulary export into an
//! [`OntologyGraph`](omopgraph_owl::OntologyGraph) in five stages:
//!
//! 1. **Reference classes**: domain, concept class, relationship and
//!    vocabulary rows become subclasses of one root per category, and fill
//!    the [`LookupTables`].
//! 2. **Concepts**: rows of in-scope vocabularies become nodes carrying a
//!    label, a code mapping, rule-driven annotations and restrictions, and
//!    fill the [`ConceptIndex`].
//! 3. **Ancestry**: immediate parents become `rdfs:subClassOf` edges.
//! 4. **Relationships**: one relationship kind becomes `skos:exactMatch`.
//! 5. **Synonyms**: synonyms in one language become `skos:altLabel`.
//!
//! Later stages only resolve concepts through the index, so a row that points
//! outside the vocabulary scope is skipped and counted, never an error.
//! Tables are streamed in bounded batches ([`ChunkedTable`]); nothing but the
//! lookups, the index and the graph itself is held in memory.

pub mod ancestry;
pub mod concepts;
pub mod config;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod reference;
pub mod relationships;
pub mod report;
pub mod rules;
pub mod synonyms;
pub mod table;

pub use ancestry::AncestryBuilder;
pub use concepts::ConceptBuilder;
pub use config::{AnnotationRule, PipelineConfig, PropertyRule, ReferenceTable, REQUIRED_TABLES};
pub use error::{PipelineError, Result};
pub use lookup::{CategoryLookup, ConceptIndex, LookupTables};
pub use pipeline::{CompiledGraph, Pipeline};
pub use reference::ReferenceClassBuilder;
pub use relationships::RelationshipBuilder;
pub use report::{RunReport, Stage, StageReport};
pub use rules::{RuleOutcome, RuleSet};
pub use synonyms::SynonymBuilder;
pub use table::{
    for_each_row, Batch, ChunkedTable, Delimiter, MemoryTables, Row, TableSource, VocabularyDir,
};
