use crate::report::Stage;
use omopgraph_owl::{OwlError, SinkError};

/// Every failure that aborts a compilation run.
///
/// Reference-resolution misses are not errors; builders count them in their
/// [`StageReport`](crate::report::StageReport) and move on.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot read table `{table}`: {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table `{table}` at line {line}: {message}")]
    Parse {
        table: String,
        line: usize,
        message: String,
    },
    #[error("table `{table}` has no column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("table `{table}` line {line}: no value for column `{column}`")]
    MissingKey {
        table: String,
        line: usize,
        column: String,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("graph declaration failed: {0}")]
    Graph(#[from] OwlError),
    #[error("document sink failed: {0}")]
    Sink(#[from] SinkError),
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub(crate) fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ PipelineError::Stage { .. } => already,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
