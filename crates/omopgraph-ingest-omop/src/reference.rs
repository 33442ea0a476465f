//! Reference-class stage: domain, concept class, relationship and vocabulary
//! tables become category roots with one subclass per row.

use crate::config::{PipelineConfig, ReferenceTable};
use crate::error::{PipelineError, Result};
use crate::lookup::LookupTables;
use crate::report::{Stage, StageReport};
use crate::table::{for_each_row, Row, TableSource};
use omopgraph_owl::{Literal, OntologyGraph};

pub struct ReferenceClassBuilder<'c> {
    config: &'c PipelineConfig,
}

impl<'c> ReferenceClassBuilder<'c> {
    pub fn new(config: &'c PipelineConfig) -> Self {
        Self { config }
    }

    /// Load every configured reference table, in configuration order.
    pub fn load(
        &self,
        source: &dyn TableSource,
        graph: &mut OntologyGraph,
    ) -> Result<(LookupTables, StageReport)> {
        tracing::info!(
            tables = self.config.reference_tables.len(),
            "creating classes for reference categories"
        );
        let mut lookups = LookupTables::new();
        let mut report = StageReport::new(Stage::ReferenceClasses);
        let source_id = graph.annotation_property(&self.config.source_id_property)?;

        for table in &self.config.reference_tables {
            self.load_table(source, table, graph, &mut lookups, &mut report, source_id)?;
        }

        tracing::info!(
            rows = report.rows_read,
            nodes = report.nodes_created,
            duplicates = report.duplicates,
            "reference categories loaded"
        );
        Ok((lookups, report))
    }

    fn load_table(
        &self,
        source: &dyn TableSource,
        table: &ReferenceTable,
        graph: &mut OntologyGraph,
        lookups: &mut LookupTables,
        report: &mut StageReport,
        source_id: omopgraph_owl::PropertyId,
    ) -> Result<()> {
        tracing::info!(category = %table.category, table = %table.table, "reading reference table");

        let ns = graph.namespace().clone();
        let root = graph.class(&ns.category_iri(&table.category));
        lookups.insert_category(&table.category, root);
        report.nodes_created += 1;

        let required = [
            table.key_column.as_str(),
            table.id_column.as_str(),
            table.label_column.as_str(),
        ];
        let chunk_size = self.config.chunk_size_for(&table.table);
        let language = self.config.label_language.as_str();

        let rows = for_each_row(source, &table.table, chunk_size, &required, |row| {
            let key = required_value(row, &table.table, &table.key_column)?;
            let id = required_value(row, &table.table, &table.id_column)?;
            let label = row.get(&table.label_column).unwrap_or_default();

            if lookups.get(&table.category, key).is_some() {
                report.duplicates += 1;
                tracing::warn!(category = %table.category, key, line = row.line(), "duplicate reference key ignored");
                return Ok(());
            }

            let node = graph.class(&ns.reference_iri(&table.category, key));
            graph.add_subclass(node, root);
            graph.add_label(node, label, Some(language));
            graph.annotate_literal(node, source_id, Literal::plain(id));
            lookups.insert(&table.category, key, node);

            report.rows_kept += 1;
            report.nodes_created += 1;
            report.edges_added += 1;
            report.annotations_added += 2;
            Ok(())
        })?;
        report.rows_read += rows;
        Ok(())
    }
}

/// A key or id cell; blank counts as missing.
fn required_value<'r>(row: &'r Row, table: &str, column: &str) -> Result<&'r str> {
    match row.get(column) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PipelineError::MissingKey {
            table: table.to_string(),
            line: row.line(),
            column: column.to_string(),
        }),
    }
}
