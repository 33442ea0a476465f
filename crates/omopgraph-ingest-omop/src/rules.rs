//! Interpreter for the declarative concept rules.
//!
//! Rules are data (`AnnotationRule`, `PropertyRule`). Compiling them declares
//! their properties in the graph and binds each property rule to its lookup
//! table; evaluating them against a row is then a pure function, safe to run
//! on many rows at once.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::lookup::{CategoryLookup, LookupTables};
use crate::table::Row;
use omopgraph_owl::{NodeId, OntologyGraph, PropertyId};

#[derive(Debug)]
struct BoundAnnotation<'a> {
    property: PropertyId,
    column: &'a str,
}

#[derive(Debug)]
struct BoundProperty<'a> {
    property: PropertyId,
    column: &'a str,
    lookup: &'a CategoryLookup,
}

#[derive(Debug)]
pub struct RuleSet<'a> {
    annotations: Vec<BoundAnnotation<'a>>,
    properties: Vec<BoundProperty<'a>>,
}

/// What the rules assert for one row.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RuleOutcome<'r> {
    pub annotations: Vec<(PropertyId, &'r str)>,
    pub restrictions: Vec<(PropertyId, NodeId)>,
    /// Non-blank property-rule values missing from their lookup.
    pub unresolved: u32,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl<'a> RuleSet<'a> {
    pub fn compile(
        config: &'a PipelineConfig,
        graph: &mut OntologyGraph,
        lookups: &'a LookupTables,
    ) -> Result<Self> {
        let mut annotations = Vec::with_capacity(config.annotation_rules.len());
        for rule in &config.annotation_rules {
            annotations.push(BoundAnnotation {
                property: graph.annotation_property(&rule.name)?,
                column: rule.source_column.as_str(),
            });
        }

        let mut properties = Vec::with_capacity(config.property_rules.len());
        for rule in &config.property_rules {
            let lookup = lookups.category(&rule.lookup).ok_or_else(|| {
                PipelineError::Config(format!(
                    "property rule `{}` targets unknown lookup `{}`",
                    rule.name, rule.lookup
                ))
            })?;
            properties.push(BoundProperty {
                property: graph.object_property(&rule.name)?,
                column: rule.source_column.as_str(),
                lookup,
            });
        }

        Ok(Self {
            annotations,
            properties,
        })
    }

    /// Source columns the rules read.
    pub fn columns(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.annotations
            .iter()
            .map(|r| r.column)
            .chain(self.properties.iter().map(|r| r.column))
    }

    pub fn evaluate<'r>(&self, row: &'r Row) -> RuleOutcome<'r> {
        let mut outcome = RuleOutcome::default();

        for rule in &self.annotations {
            if let Some(value) = present(row.get(rule.column)) {
                outcome.annotations.push((rule.property, value));
            }
        }

        for rule in &self.properties {
            if let Some(value) = present(row.get(rule.column)) {
                match rule.lookup.get(value) {
                    Some(target) => outcome.restrictions.push((rule.property, target)),
                    None => outcome.unresolved += 1,
                }
            }
        }

        outcome
    }
}
