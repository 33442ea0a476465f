//! Ancestry stage: immediate parents from `CONCEPT_ANCESTOR.csv`.
//!
//! Only rows at one level of separation become `rdfs:subClassOf` edges.
//! Deeper ancestry follows from those edges and is left to a reasoner.

use crate::config::{PipelineConfig, CONCEPT_ANCESTOR_TABLE};
use crate::error::Result;
use crate::lookup::ConceptIndex;
use crate::report::{Stage, StageReport};
use crate::table::{for_each_row, TableSource};
use omopgraph_owl::OntologyGraph;

const ANCESTOR: &str = "ancestor_concept_id";
const DESCENDANT: &str = "descendant_concept_id";
const MIN_LEVELS: &str = "min_levels_of_separation";

pub struct AncestryBuilder<'c> {
    config: &'c PipelineConfig,
}

impl<'c> AncestryBuilder<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    pub fn load(
        &self,
        source: &dyn TableSource,
        graph: &mut OntologyGraph,
        index: &ConceptIndex,
    ) -> Result<StageReport> {
        tracing::info!("creating subclass relationships");
        let mut report = StageReport::new(Stage::Ancestry);

        let rows = for_each_row(
            source,
            CONCEPT_ANCESTOR_TABLE,
            self.config.chunk_size_for(CONCEPT_ANCESTOR_TABLE),
            &[ANCESTOR, DESCENDANT, MIN_LEVELS],
            |row| {
                if row.get(MIN_LEVELS) != Some("1") {
                    return Ok(());
                }
                report.rows_kept += 1;

                let parent = row.get(ANCESTOR).and_then(|id| index.lookup(id));
                let child = row.get(DESCENDANT).and_then(|id| index.lookup(id));
                match (child, parent) {
                    (Some(child), Some(parent)) => {
                        graph.add_subclass(child, parent);
                        report.edges_added += 1;
                    }
                    _ => report.unresolved += 1,
                }
                Ok(())
            },
        )?;
        report.rows_read = rows;

        tracing::info!(
            rows = report.rows_read,
            edges = report.edges_added,
            unresolved = report.unresolved,
            "subclass relationships created"
        );
        Ok(report)
    }
}
