//! Document sinks: the serialization boundary of a compiled graph.

use crate::graph::OntologyGraph;
use crate::json::JsonSink;
use crate::turtle::TurtleSink;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write document `{path}`: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: Box<SinkError>,
    },
}

/// Anything that can persist a finished graph.
pub trait DocumentSink {
    fn write_document(&mut self, graph: &OntologyGraph) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Turtle,
    Json,
}

impl DocumentFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "ttl" | "turtle" => Some(Self::Turtle),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Writes a graph to a file, all or nothing.
///
/// The document is written to `<path>.partial` and renamed over `path` only
/// once the encoder and the flush have both succeeded.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: DocumentFormat,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        self.path.with_file_name(name)
    }

    fn write_partial(&self, partial: &Path, graph: &OntologyGraph) -> Result<(), SinkError> {
        let mut writer = BufWriter::new(File::create(partial)?);
        match self.format {
            DocumentFormat::Turtle => TurtleSink::new(&mut writer).write_document(graph)?,
            DocumentFormat::Json => JsonSink::new(&mut writer).write_document(graph)?,
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl DocumentSink for FileSink {
    fn write_document(&mut self, graph: &OntologyGraph) -> Result<(), SinkError> {
        let partial = self.partial_path();
        let result = self
            .write_partial(&partial, graph)
            .and_then(|()| fs::rename(&partial, &self.path).map_err(SinkError::from));
        if let Err(err) = result {
            let _ = fs::remove_file(&partial);
            return Err(SinkError::Document {
                path: self.path.clone(),
                source: Box::new(err),
            });
        }
        Ok(())
    }
}
