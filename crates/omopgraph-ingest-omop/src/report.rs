//! Per-stage counters returned by every builder.

use omopgraph_owl::GraphStats;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ReferenceClasses,
    Concepts,
    Ancestry,
    Relationships,
    Synonyms,
}

impl Stage {
    /// Execution order of a run.
    pub const ORDER: [Stage; 5] = [
        Stage::ReferenceClasses,
        Stage::Concepts,
        Stage::Ancestry,
        Stage::Relationships,
        Stage::Synonyms,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::ReferenceClasses => "reference-classes",
            Stage::Concepts => "concepts",
            Stage::Ancestry => "ancestry",
            Stage::Relationships => "relationships",
            Stage::Synonyms => "synonyms",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Data rows streamed from the stage's table(s).
    pub rows_read: u64,
    /// Rows that passed the stage filter.
    pub rows_kept: u64,
    pub nodes_created: u64,
    pub edges_added: u64,
    pub annotations_added: u64,
    /// Filtered rows dropped because a reference did not resolve.
    pub unresolved: u64,
    /// Rows whose key was already seen earlier in the stage.
    pub duplicates: u64,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            rows_read: 0,
            rows_kept: 0,
            nodes_created: 0,
            edges_added: 0,
            annotations_added: 0,
            unresolved: 0,
            duplicates: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub graph: GraphStats,
    pub concepts_indexed: usize,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}
