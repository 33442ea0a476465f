//! Concept stage: one node per in-scope row of `CONCEPT.csv`.
//!
//! Each batch is handled in two steps. Planning turns a row into a
//! [`ConceptPlan`] (filter, IRI, code mapping, rule outcome) and only reads
//! shared state, so it may run on the rayon pool. Applying the plans mutates
//! the graph and the index and always happens on the calling thread, in row
//! order.

use crate::config::{PipelineConfig, CONCEPT_TABLE};
use crate::error::{PipelineError, Result};
use crate::lookup::{ConceptIndex, LookupTables};
use crate::report::{Stage, StageReport};
use crate::rules::{RuleOutcome, RuleSet};
use crate::table::{ChunkedTable, Row, TableSource};
use ahash::AHashSet;
use omopgraph_owl::{vocabulary_key, Literal, Namespace, OntologyGraph, PropertyId};
use rayon::prelude::*;

const CONCEPT_ID: &str = "concept_id";
const CONCEPT_NAME: &str = "concept_name";
const VOCABULARY_ID: &str = "vocabulary_id";
const CONCEPT_CODE: &str = "concept_code";

/// Everything one row contributes, computed without touching the graph.
#[derive(Debug)]
struct ConceptPlan<'r> {
    concept_id: &'r str,
    iri: String,
    code: String,
    label: &'r str,
    line: usize,
    rules: RuleOutcome<'r>,
}

/// Shared, read-only inputs of the planning step.
struct Planner<'a> {
    namespace: &'a Namespace,
    targets: AHashSet<&'a str>,
    rules: &'a RuleSet<'a>,
}

impl Planner<'_> {
    fn plan<'r>(&self, row: &'r Row) -> Result<Option<ConceptPlan<'r>>> {
        let vocabulary = row.get(VOCABULARY_ID).unwrap_or_default();
        if !self.targets.contains(vocabulary) {
            return Ok(None);
        }

        let concept_id = match row.get(CONCEPT_ID) {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(PipelineError::MissingKey {
                    table: CONCEPT_TABLE.to_string(),
                    line: row.line(),
                    column: CONCEPT_ID.to_string(),
                })
            }
        };
        let code = row.get(CONCEPT_CODE).unwrap_or_default();

        Ok(Some(ConceptPlan {
            concept_id,
            iri: self.namespace.concept_iri(concept_id),
            code: format!("{}:{}", vocabulary_key(vocabulary), code),
            label: row.get(CONCEPT_NAME).unwrap_or_default(),
            line: row.line(),
            rules: self.rules.evaluate(row),
        }))
    }
}

pub struct ConceptBuilder<'c> {
    config: &'c PipelineConfig,
}

impl<'c> ConceptBuilder<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// Stream `CONCEPT.csv` into `graph` and fill `index`.
    ///
    /// Concept identifiers are expected to be unique within the target
    /// vocabularies. A repeated identifier resolves to the node already
    /// created for it and its row is applied again, so that node carries the
    /// facts of every row sharing the identifier: each label, each code
    /// mapping and each restriction. The stage report counts the repeats
    /// under `duplicates`.
    pub fn load(
        &self,
        source: &dyn TableSource,
        graph: &mut OntologyGraph,
        lookups: &LookupTables,
        index: &mut ConceptIndex,
    ) -> Result<StageReport> {
        let config = self.config;
        tracing::info!(
            vocabularies = ?config.target_vocabularies,
            parallel = config.parallel_rows,
            "creating concept classes"
        );

        let code_property = graph.annotation_property(&config.code_property)?;
        let rules = RuleSet::compile(config, graph, lookups)?;
        let namespace = graph.namespace().clone();
        let planner = Planner {
            namespace: &namespace,
            targets: config.target_vocabularies.iter().map(String::as_str).collect(),
            rules: &rules,
        };

        let chunks = ChunkedTable::open(source, CONCEPT_TABLE, config.chunk_size_for(CONCEPT_TABLE))?;
        chunks.require_columns([CONCEPT_ID, CONCEPT_NAME, VOCABULARY_ID, CONCEPT_CODE])?;
        chunks.require_columns(rules.columns())?;

        let mut report = StageReport::new(Stage::Concepts);
        let language = config.label_language.as_str();

        for (n, batch) in chunks.enumerate() {
            let batch = batch?;
            report.rows_read += batch.len() as u64;

            let plans: Vec<Result<Option<ConceptPlan<'_>>>> = if config.parallel_rows {
                batch.par_iter().map(|row| planner.plan(row)).collect()
            } else {
                batch.iter().map(|row| planner.plan(row)).collect()
            };

            let before = report.rows_kept;
            for plan in plans {
                if let Some(plan) = plan? {
                    apply(plan, graph, index, code_property, language, &mut report);
                }
            }
            tracing::debug!(
                batch = n,
                rows = batch.len(),
                kept = report.rows_kept - before,
                "concept batch"
            );
        }

        tracing::info!(
            rows = report.rows_read,
            concepts = report.rows_kept,
            edges = report.edges_added,
            unresolved = report.unresolved,
            duplicates = report.duplicates,
            "concept classes created"
        );
        Ok(report)
    }
}

fn apply(
    plan: ConceptPlan<'_>,
    graph: &mut OntologyGraph,
    index: &mut ConceptIndex,
    code_property: PropertyId,
    language: &str,
    report: &mut StageReport,
) {
    let existed = graph.node(&plan.iri).is_some();
    let node = graph.class(&plan.iri);
    if !existed {
        report.nodes_created += 1;
    }

    report.annotations_added += 2 + plan.rules.annotations.len() as u64;
    graph.annotate_literal(node, code_property, Literal::plain(plan.code));
    for (property, value) in plan.rules.annotations {
        graph.annotate_literal(node, property, Literal::plain(value));
    }
    for (property, target) in plan.rules.restrictions {
        graph.add_some_values_from(node, property, target);
        report.edges_added += 1;
    }
    graph.add_label(node, plan.label, Some(language));

    report.unresolved += u64::from(plan.rules.unresolved);
    report.rows_kept += 1;

    if index.insert(plan.concept_id, node).is_some() {
        report.duplicates += 1;
        tracing::warn!(
            concept_id = plan.concept_id,
            line = plan.line,
            "concept identifier seen twice; last row wins"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceClassBuilder;
    use crate::table::MemoryTables;

    const HEADER: &str = "concept_id\tconcept_name\tdomain_id\tvocabulary_id\tconcept_class_id\tstandard_concept\tconcept_code\tvalid_start_date\tvalid_end_date\tinvalid_reason\n";

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.namespace = "https://example.org/omop#".to_string();
        config
    }

    fn tables(concepts: &str) -> MemoryTables {
        MemoryTables::new()
            .with_table(
                "DOMAIN.csv",
                "domain_id,domain_name,domain_concept_id\nCondition,Condition,19\n",
            )
            .with_table(
                "CONCEPT_CLASS.csv",
                "concept_class_id,concept_class_name,concept_class_concept_id\nClinical Finding,Clinical Finding,44819236\n",
            )
            .with_table(
                "RELATIONSHIP.csv",
                "relationship_id,relationship_name,relationship_concept_id\nMaps to,Maps to,44818977\n",
            )
            .with_table(
                "VOCABULARY.csv",
                "vocabulary_id,vocabulary_name,vocabulary_concept_id\nSNOMED,SNOMED CT,44819097\nCancer Modifier,Cancer Modifier,32929\n",
            )
            .with_table(CONCEPT_TABLE, &format!("{HEADER}{concepts}"))
    }

    struct Built {
        graph: OntologyGraph,
        lookups: LookupTables,
        index: ConceptIndex,
        report: StageReport,
    }

    fn build(config: &PipelineConfig, source: &MemoryTables) -> Result<Built> {
        let mut graph = OntologyGraph::new(config.namespace()?);
        let (lookups, _) = ReferenceClassBuilder::new(config).load(source, &mut graph)?;
        let mut index = ConceptIndex::new();
        let report = ConceptBuilder::new(config).load(source, &mut graph, &lookups, &mut index)?;
        Ok(Built {
            graph,
            lookups,
            index,
            report,
        })
    }

    fn literal_of(graph: &OntologyGraph, node: omopgraph_owl::NodeId, name: &str) -> Vec<String> {
        let property = graph
            .property_by_iri(&format!("https://example.org/omop#{name}"))
            .unwrap();
        graph.literals(node, property).into_iter().map(str::to_string).collect()
    }

    #[test]
    fn in_scope_row_becomes_annotated_node() {
        let config = config();
        let source = tables("123\tFoo\tCondition\tSNOMED\t\tS\t44.1\t19700101\t20991231\t\n");
        let built = build(&config, &source).unwrap();

        let node = built.index.lookup("123").expect("indexed");
        assert_eq!(built.graph.iri(node), "https://example.org/omop#123");
        assert_eq!(built.graph.labels(node), vec!["Foo"]);
        assert_eq!(literal_of(&built.graph, node, "has_code"), vec!["snomed:44.1"]);
        assert_eq!(literal_of(&built.graph, node, "standard_concept"), vec!["S"]);
        assert!(literal_of(&built.graph, node, "invalid").is_empty());

        let condition = built.lookups.get("domain", "Condition").unwrap();
        let snomed = built.lookups.get("vocabulary", "SNOMED").unwrap();
        let in_domain = built
            .graph
            .property_by_iri("https://example.org/omop#in_domain")
            .unwrap();
        let in_vocabulary = built
            .graph
            .property_by_iri("https://example.org/omop#in_vocabulary")
            .unwrap();
        assert_eq!(
            built.graph.restrictions(node),
            vec![(in_domain, condition), (in_vocabulary, snomed)]
        );
        // blank concept_class_id asserts nothing
        assert_eq!(built.report.unresolved, 0);
        assert_eq!(built.report.edges_added, 2);
    }

    #[test]
    fn out_of_scope_vocabularies_are_invisible() {
        let config = config();
        let source = tables(
            "1\tKept\tCondition\tSNOMED\t\t\tA\t\t\t\n\
             2\tDropped\tCondition\tRxNorm\t\t\tB\t\t\t\n",
        );
        let built = build(&config, &source).unwrap();
        assert_eq!(built.report.rows_read, 2);
        assert_eq!(built.report.rows_kept, 1);
        assert!(built.index.lookup("2").is_none());
        assert!(built.graph.node("https://example.org/omop#2").is_none());
    }

    #[test]
    fn vocabulary_key_folds_case_and_spaces() {
        let config = config();
        let source = tables("7\tStage\t\tCancer Modifier\t\t\tc4.1\t\t\t\n");
        let built = build(&config, &source).unwrap();
        let node = built.index.lookup("7").unwrap();
        assert_eq!(
            literal_of(&built.graph, node, "has_code"),
            vec!["cancer_modifier:c4.1"]
        );
    }

    #[test]
    fn unresolved_lookup_value_is_counted_not_fatal() {
        let config = config();
        let source = tables("5\tOdd\tSpaceship\tSNOMED\t\t\tX\t\t\t\n");
        let built = build(&config, &source).unwrap();
        let node = built.index.lookup("5").unwrap();
        assert_eq!(built.report.unresolved, 1);
        assert_eq!(built.graph.restrictions(node).len(), 1);
    }

    #[test]
    fn repeated_identifier_is_counted() {
        let config = config();
        let source = tables(
            "9\tFirst\t\tSNOMED\t\t\tA\t\t\t\n\
             9\tSecond\t\tSNOMED\t\t\tB\t\t\t\n",
        );
        let built = build(&config, &source).unwrap();
        assert_eq!(built.report.duplicates, 1);
        assert_eq!(built.report.nodes_created, 1);
        assert_eq!(built.index.len(), 1);

        // both rows land on the one node
        let node = built.index.lookup("9").unwrap();
        assert_eq!(built.graph.labels(node), vec!["First", "Second"]);
        assert_eq!(
            literal_of(&built.graph, node, "has_code"),
            vec!["snomed:A", "snomed:B"]
        );
    }

    #[test]
    fn blank_identifier_aborts() {
        let config = config();
        let source = tables("\tNo id\t\tSNOMED\t\t\tA\t\t\t\n");
        assert!(matches!(
            build(&config, &source),
            Err(PipelineError::MissingKey { ref column, line: 2, .. }) if column == CONCEPT_ID
        ));
    }

    #[test]
    fn missing_rule_column_aborts() {
        let config = config();
        let source = tables("").with_table(
            CONCEPT_TABLE,
            "concept_id,concept_name,vocabulary_id,concept_code\n1,a,SNOMED,x\n",
        );
        assert!(matches!(
            build(&config, &source),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn parallel_planning_matches_sequential() {
        let mut rows = String::new();
        for i in 0..257 {
            let vocab = if i % 3 == 0 { "RxNorm" } else { "SNOMED" };
            let domain = if i % 2 == 0 { "Condition" } else { "" };
            rows.push_str(&format!("{i}\tc{i}\t{domain}\t{vocab}\t\t\tk{i}\t\t\t\n"));
        }
        let mut sequential = config();
        sequential.chunk_size = 16;
        let mut parallel = sequential.clone();
        parallel.parallel_rows = true;

        let source = tables(&rows);
        let a = build(&sequential, &source).unwrap();
        let b = build(&parallel, &source).unwrap();

        assert_eq!(a.report, b.report);
        assert_eq!(a.graph.edges(), b.graph.edges());
        assert_eq!(a.graph.annotations(), b.graph.annotations());
        let ia: Vec<&str> = a.graph.nodes().map(|(_, iri)| iri).collect();
        let ib: Vec<&str> = b.graph.nodes().map(|(_, iri)| iri).collect();
        assert_eq!(ia, ib);
    }
}
