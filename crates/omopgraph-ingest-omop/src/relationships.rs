//! Relationship stage: one configured relationship kind from
//! `CONCEPT_RELATIONSHIP.csv`, recorded as `skos:exactMatch` annotations.

use crate::config::{PipelineConfig, CONCEPT_RELATIONSHIP_TABLE};
use crate::error::Result;
use crate::lookup::ConceptIndex;
use crate::report::{Stage, StageReport};
use crate::table::{for_each_row, TableSource};
use omopgraph_owl::{AnnotationValue, OntologyGraph};

const SOURCE: &str = "concept_id_1";
const TARGET: &str = "concept_id_2";
const RELATIONSHIP_ID: &str = "relationship_id";

pub struct RelationshipBuilder<'c> {
    config: &'c PipelineConfig,
}

impl<'c> RelationshipBuilder<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// The mapping is asymmetric: only the source concept gets annotated.
    pub fn load(
        &self,
        source: &dyn TableSource,
        graph: &mut OntologyGraph,
        index: &ConceptIndex,
    ) -> Result<StageReport> {
        let wanted = self.config.relationship_id.as_str();
        tracing::info!(relationship = wanted, "creating concept mappings");

        let exact_match = graph.exact_match_property();
        let mut report = StageReport::new(Stage::Relationships);

        let rows = for_each_row(
            source,
            CONCEPT_RELATIONSHIP_TABLE,
            self.config.chunk_size_for(CONCEPT_RELATIONSHIP_TABLE),
            &[SOURCE, TARGET, RELATIONSHIP_ID],
            |row| {
                if row.get(RELATIONSHIP_ID) != Some(wanted) {
                    return Ok(());
                }
                report.rows_kept += 1;

                let from = row.get(SOURCE).and_then(|id| index.lookup(id));
                let to = row.get(TARGET).and_then(|id| index.lookup(id));
                match (from, to) {
                    (Some(from), Some(to)) => {
                        graph.annotate(from, exact_match, AnnotationValue::Node(to));
                        report.annotations_added += 1;
                    }
                    _ => report.unresolved += 1,
                }
                Ok(())
            },
        )?;
        report.rows_read = rows;

        tracing::info!(
            rows = report.rows_read,
            mappings = report.annotations_added,
            unresolved = report.unresolved,
            "concept mappings created"
        );
        Ok(report)
    }
}
