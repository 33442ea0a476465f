//! Synonym stage: `skos:altLabel` per synonym in the configured language.

use crate::config::{PipelineConfig, CONCEPT_SYNONYM_TABLE};
use crate::error::Result;
use crate::lookup::ConceptIndex;
use crate::report::{Stage, StageReport};
use crate::table::{for_each_row, TableSource};
use omopgraph_owl::{Literal, OntologyGraph};

const CONCEPT_ID: &str = "concept_id";
const SYNONYM: &str = "concept_synonym_name";
const LANGUAGE: &str = "language_concept_id";

pub struct SynonymBuilder<'c> {
    config: &'c PipelineConfig,
}

impl<'c> SynonymBuilder<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// Synonyms accumulate; identical text on the same concept is kept twice.
    pub fn load(
        &self,
        source: &dyn TableSource,
        graph: &mut OntologyGraph,
        index: &ConceptIndex,
    ) -> Result<StageReport> {
        let language = self.config.synonym_language.as_str();
        tracing::info!(language, "creating synonyms");

        let alt_label = graph.alt_label_property();
        let mut report = StageReport::new(Stage::Synonyms);

        let rows = for_each_row(
            source,
            CONCEPT_SYNONYM_TABLE,
            self.config.chunk_size_for(CONCEPT_SYNONYM_TABLE),
            &[CONCEPT_ID, SYNONYM, LANGUAGE],
            |row| {
                if row.get(LANGUAGE) != Some(language) {
                    return Ok(());
                }
                report.rows_kept += 1;

                match row.get(CONCEPT_ID).and_then(|id| index.lookup(id)) {
                    Some(node) => {
                        let text = row.get(SYNONYM).unwrap_or_default();
                        graph.annotate_literal(node, alt_label, Literal::plain(text));
                        report.annotations_added += 1;
                    }
                    None => report.unresolved += 1,
                }
                Ok(())
            },
        )?;
        report.rows_read = rows;

        tracing::info!(
            rows = report.rows_read,
            synonyms = report.annotations_added,
            unresolved = report.unresolved,
            "synonyms created"
        );
        Ok(report)
    }
}
