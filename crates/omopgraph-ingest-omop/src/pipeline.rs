//! Stage orchestration.
//!
//! A run owns the graph, the lookup tables and the concept index, lends them
//! to each builder in turn, and only hands the graph to a sink once every
//! stage has finished. Any error aborts the run before the sink is touched.

use crate::ancestry::AncestryBuilder;
use crate::concepts::ConceptBuilder;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::lookup::{ConceptIndex, LookupTables};
use crate::reference::ReferenceClassBuilder;
use crate::relationships::RelationshipBuilder;
use crate::report::{RunReport, Stage};
use crate::synonyms::SynonymBuilder;
use crate::table::TableSource;
use omopgraph_owl::{DocumentSink, OntologyGraph};
use std::time::Instant;

/// Output of a successful compilation, before serialization.
#[derive(Debug)]
pub struct CompiledGraph {
    pub graph: OntologyGraph,
    pub lookups: LookupTables,
    pub index: ConceptIndex,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage in order and return the finished graph.
    pub fn compile(&self, source: &dyn TableSource) -> Result<CompiledGraph> {
        let config = &self.config;
        let mut graph = OntologyGraph::new(config.namespace()?);
        let mut index = ConceptIndex::new();
        let mut stages = Vec::with_capacity(Stage::ORDER.len());

        let (lookups, report) = timed(Stage::ReferenceClasses, || {
            ReferenceClassBuilder::new(config).load(source, &mut graph)
        })?;
        stages.push(report);

        stages.push(timed(Stage::Concepts, || {
            ConceptBuilder::new(config).load(source, &mut graph, &lookups, &mut index)
        })?);
        stages.push(timed(Stage::Ancestry, || {
            AncestryBuilder::new(config).load(source, &mut graph, &index)
        })?);
        stages.push(timed(Stage::Relationships, || {
            RelationshipBuilder::new(config).load(source, &mut graph, &index)
        })?);
        stages.push(timed(Stage::Synonyms, || {
            SynonymBuilder::new(config).load(source, &mut graph, &index)
        })?);

        let report = RunReport {
            stages,
            graph: graph.stats(),
            concepts_indexed: index.len(),
        };
        tracing::info!(
            nodes = report.graph.nodes,
            subclass_edges = report.graph.subclass_edges,
            restriction_edges = report.graph.restriction_edges,
            annotations = report.graph.annotations,
            concepts = report.concepts_indexed,
            "graph compiled"
        );

        Ok(CompiledGraph {
            graph,
            lookups,
            index,
            report,
        })
    }

    /// Compile, then write the graph to `sink`.
    pub fn run(&self, source: &dyn TableSource, sink: &mut dyn DocumentSink) -> Result<RunReport> {
        let compiled = self.compile(source)?;
        let started = Instant::now();
        sink.write_document(&compiled.graph)?;
        tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "document written");
        Ok(compiled.report)
    }
}

fn timed<T>(stage: Stage, body: impl FnOnce() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    tracing::info!(%stage, "stage started");
    let out = body().map_err(|e| e.in_stage(stage))?;
    tracing::info!(
        %stage,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage finished"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CONCEPT_ANCESTOR_TABLE, CONCEPT_CLASS_TABLE, CONCEPT_RELATIONSHIP_TABLE,
        CONCEPT_SYNONYM_TABLE, CONCEPT_TABLE, DOMAIN_TABLE, ENGLISH_LANGUAGE_CONCEPT,
        RELATIONSHIP_TABLE, VOCABULARY_TABLE,
    };
    use crate::error::PipelineError;
    use crate::table::MemoryTables;
    use omopgraph_owl::SinkError;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.namespace = "https://example.org/omop#".to_string();
        config
    }

    fn tables() -> MemoryTables {
        MemoryTables::new()
            .with_table(DOMAIN_TABLE, "domain_id,domain_name,domain_concept_id\nCondition,Condition,19\n")
            .with_table(
                CONCEPT_CLASS_TABLE,
                "concept_class_id,concept_class_name,concept_class_concept_id\nDisorder,Disorder,1\n",
            )
            .with_table(
                RELATIONSHIP_TABLE,
                "relationship_id,relationship_name,relationship_concept_id\nMaps to,Maps to,44818977\n",
            )
            .with_table(
                VOCABULARY_TABLE,
                "vocabulary_id,vocabulary_name,vocabulary_concept_id\nSNOMED,SNOMED CT,44819097\n",
            )
            .with_table(
                CONCEPT_TABLE,
                "concept_id\tconcept_name\tdomain_id\tvocabulary_id\tconcept_class_id\tstandard_concept\tconcept_code\tinvalid_reason\n\
                 1\tDisease\tCondition\tSNOMED\tDisorder\tS\t64572001\t\n\
                 2\tNeoplasm\tCondition\tSNOMED\tDisorder\tS\t108369006\t\n\
                 3\tOld neoplasm\tCondition\tSNOMED\tDisorder\t\t999\tU\n\
                 4\tA drug\tDrug\tRxNorm\t\t\t42\t\n",
            )
            .with_table(
                CONCEPT_ANCESTOR_TABLE,
                "ancestor_concept_id\tdescendant_concept_id\tmin_levels_of_separation\tmax_levels_of_separation\n\
                 1\t2\t1\t1\n\
                 1\t3\t2\t2\n\
                 2\t3\t1\t1\n\
                 1\t4\t1\t1\n",
            )
            .with_table(
                CONCEPT_RELATIONSHIP_TABLE,
                "concept_id_1\tconcept_id_2\trelationship_id\n3\t2\tMaps to\n2\t3\tMapped from\n",
            )
            .with_table(
                CONCEPT_SYNONYM_TABLE,
                &format!(
                    "concept_id\tconcept_synonym_name\tlanguage_concept_id\n2\tTumour\t{ENGLISH_LANGUAGE_CONCEPT}\n2\tTumor\t4182504\n"
                ),
            )
    }

    /// Records whether it was called.
    #[derive(Default)]
    struct CountingSink {
        calls: usize,
        nodes: usize,
    }

    impl DocumentSink for CountingSink {
        fn write_document(&mut self, graph: &OntologyGraph) -> Result<(), SinkError> {
            self.calls += 1;
            self.nodes = graph.node_count();
            Ok(())
        }
    }

    #[test]
    fn compiles_every_stage_in_order() {
        let pipeline = Pipeline::new(config()).unwrap();
        let compiled = pipeline.compile(&tables()).unwrap();
        let stages: Vec<Stage> = compiled.report.stages.iter().map(|r| r.stage).collect();
        assert_eq!(stages, Stage::ORDER.to_vec());

        let graph = &compiled.graph;
        let one = compiled.index.lookup("1").unwrap();
        let two = compiled.index.lookup("2").unwrap();
        let three = compiled.index.lookup("3").unwrap();
        assert!(compiled.index.lookup("4").is_none());
        assert_eq!(compiled.report.concepts_indexed, 3);

        assert_eq!(graph.superclasses(two), vec![one]);
        assert_eq!(graph.superclasses(three), vec![two]);

        let ancestry = compiled.report.stage(Stage::Ancestry).unwrap();
        assert_eq!(ancestry.rows_kept, 3);
        assert_eq!(ancestry.edges_added, 2);
        assert_eq!(ancestry.unresolved, 1);

        assert_eq!(graph.literals(two, graph.alt_label_property()), vec!["Tumour"]);
        let relationships = compiled.report.stage(Stage::Relationships).unwrap();
        assert_eq!(relationships.annotations_added, 1);
    }

    #[test]
    fn run_hands_graph_to_sink_once() {
        let pipeline = Pipeline::new(config()).unwrap();
        let mut sink = CountingSink::default();
        let report = pipeline.run(&tables(), &mut sink).unwrap();
        assert_eq!(sink.calls, 1);
        assert_eq!(sink.nodes, report.graph.nodes);
    }

    #[test]
    fn failing_stage_never_reaches_sink() {
        let pipeline = Pipeline::new(config()).unwrap();
        let mut source = tables();
        source.insert(CONCEPT_ANCESTOR_TABLE, "ancestor_concept_id,descendant_concept_id\n1,2\n");
        let mut sink = CountingSink::default();
        let err = pipeline.run(&source, &mut sink).unwrap_err();
        assert_eq!(sink.calls, 0);
        match err {
            PipelineError::Stage { stage, source } => {
                assert_eq!(stage, Stage::Ancestry);
                assert!(matches!(*source, PipelineError::MissingColumn { .. }));
            }
            other => panic!("expected stage error, got {other:?}"),
        }
    }

    #[test]
    fn missing_table_names_the_stage() {
        let pipeline = Pipeline::new(config()).unwrap();
        let source = MemoryTables::new();
        match pipeline.compile(&source) {
            Err(PipelineError::Stage { stage, .. }) => assert_eq!(stage, Stage::ReferenceClasses),
            other => panic!("expected stage error, got {other:?}"),
        }
    }

    #[test]
    fn later_stages_resolve_nothing_against_an_empty_index() {
        let config = config();
        let source = tables();
        let mut graph = OntologyGraph::new(config.namespace().unwrap());
        let index = ConceptIndex::new();

        let ancestry = AncestryBuilder::new(&config).load(&source, &mut graph, &index).unwrap();
        let relationships = RelationshipBuilder::new(&config)
            .load(&source, &mut graph, &index)
            .unwrap();
        let synonyms = SynonymBuilder::new(&config).load(&source, &mut graph, &index).unwrap();

        assert_eq!(graph.node_count(), 0);
        assert!(graph.edges().is_empty());
        assert!(graph.annotations().is_empty());
        assert_eq!(ancestry.unresolved, 3);
        assert_eq!(relationships.unresolved, 1);
        assert_eq!(synonyms.unresolved, 1);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = config();
        config.namespace = "not a namespace".to_string();
        assert!(matches!(Pipeline::new(config), Err(PipelineError::Graph(_))));
    }

    #[test]
    fn identical_inputs_give_identical_graphs() {
        let pipeline = Pipeline::new(config()).unwrap();
        let a = pipeline.compile(&tables()).unwrap();
        let b = pipeline.compile(&tables()).unwrap();
        assert_eq!(a.graph.edges(), b.graph.edges());
        assert_eq!(a.graph.annotations(), b.graph.annotations());
        assert_eq!(a.report.stages, b.report.stages);
    }
}
