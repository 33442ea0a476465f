//! Chunked reader for delimited vocabulary tables.
//!
//! A table is read exactly once, front to back, as a sequence of bounded
//! batches. The first line is the header; its column names label every row.
//! Fields are split literally on the delimiter: there is no quoting and no
//! escaping, which matches how the vocabulary exports are produced.

use crate::error::{PipelineError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// Table sources
// ============================================================================

/// Opens tables by file name.
pub trait TableSource {
    fn open(&self, table: &str) -> Result<Box<dyn BufRead + '_>>;
}

/// Tables stored as files in one directory.
#[derive(Debug, Clone)]
pub struct VocabularyDir {
    root: PathBuf,
}

impl VocabularyDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    /// Tables from `tables` that are missing or not readable files.
    pub fn missing_tables<'t>(&self, tables: &[&'t str]) -> Vec<&'t str> {
        tables
            .iter()
            .copied()
            .filter(|table| {
                let path = self.path_of(table);
                !(path.is_file() && File::open(&path).is_ok())
            })
            .collect()
    }
}

impl TableSource for VocabularyDir {
    fn open(&self, table: &str) -> Result<Box<dyn BufRead + '_>> {
        let path = self.path_of(table);
        let file = File::open(&path).map_err(|source| PipelineError::Io {
            table: path.display().to_string(),
            source,
        })?;
        Ok(Box::new(BufReader::with_capacity(1 << 16, file)))
    }
}

/// Tables held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    tables: HashMap<String, String>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, text: &str) -> Self {
        self.insert(table, text);
        self
    }

    pub fn insert(&mut self, table: &str, text: &str) {
        self.tables.insert(table.to_string(), text.to_string());
    }
}

impl TableSource for MemoryTables {
    fn open(&self, table: &str) -> Result<Box<dyn BufRead + '_>> {
        let text = self.tables.get(table).ok_or_else(|| PipelineError::Io {
            table: table.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such table"),
        })?;
        Ok(Box::new(Cursor::new(text.as_bytes())))
    }
}

// ============================================================================
// Rows and batches
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    /// Pick the delimiter that splits `header` into more columns.
    ///
    /// Tab wins only when it yields strictly more columns than comma.
    pub fn detect(header: &str) -> Self {
        let commas = header.split(',').count();
        let tabs = header.split('\t').count();
        if tabs > commas {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
        }
    }
}

/// One table record, labeled by the header's column names.
#[derive(Debug, Clone)]
pub struct Row {
    header: Arc<[String]>,
    fields: Vec<String>,
    line: usize,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .iter()
            .position(|c| c == column)
            .map(|i| self.fields[i].as_str())
    }

    /// 1-based line number in the source table.
    pub fn line(&self) -> usize {
        self.line
    }
}

pub type Batch = Vec<Row>;

// ============================================================================
// ChunkedTable
// ============================================================================

/// Lazy, single-pass stream of [`Batch`]es over one table.
pub struct ChunkedTable<R> {
    name: String,
    reader: R,
    header: Arc<[String]>,
    delimiter: Delimiter,
    chunk_size: usize,
    line: usize,
    buf: String,
    done: bool,
}

impl<'s> ChunkedTable<Box<dyn BufRead + 's>> {
    pub fn open(source: &'s dyn TableSource, table: &str, chunk_size: usize) -> Result<Self> {
        let reader = source.open(table)?;
        Self::new(table, reader, chunk_size)
    }
}

/// A line that is not valid UTF-8 is malformed input, not an I/O failure.
fn read_error(table: &str, line: usize, source: std::io::Error) -> PipelineError {
    if source.kind() == std::io::ErrorKind::InvalidData {
        PipelineError::Parse {
            table: table.to_string(),
            line,
            message: source.to_string(),
        }
    } else {
        PipelineError::Io {
            table: table.to_string(),
            source,
        }
    }
}

impl<R: BufRead> ChunkedTable<R> {
    pub fn new(name: &str, mut reader: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(PipelineError::Config(format!(
                "chunk size for `{name}` must be positive"
            )));
        }

        let mut buf = String::new();
        let read = reader
            .read_line(&mut buf)
            .map_err(|source| read_error(name, 1, source))?;
        if read == 0 {
            return Err(PipelineError::Parse {
                table: name.to_string(),
                line: 1,
                message: "missing header row".to_string(),
            });
        }

        let header_line = trim_line_end(&buf).trim_start_matches('\u{feff}');
        let delimiter = Delimiter::detect(header_line);
        let header: Vec<String> = header_line
            .split(delimiter.as_char())
            .map(str::to_string)
            .collect();

        Ok(Self {
            name: name.to_string(),
            reader,
            header: Arc::from(header),
            delimiter,
            chunk_size,
            line: 1,
            buf,
            done: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.header.iter().any(|c| c == column)
    }

    /// Fail fast when the header lacks any of `columns`.
    pub fn require_columns<'c, I>(&self, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'c str>,
    {
        for column in columns {
            if !self.has_column(column) {
                return Err(PipelineError::MissingColumn {
                    table: self.name.clone(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_line(&mut self.buf)
                .map_err(|source| read_error(&self.name, self.line + 1, source))?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = trim_line_end(&self.buf);
            if text.is_empty() {
                continue;
            }

            let fields: Vec<String> = text
                .split(self.delimiter.as_char())
                .map(str::to_string)
                .collect();
            if fields.len() != self.header.len() {
                return Err(PipelineError::Parse {
                    table: self.name.clone(),
                    line: self.line,
                    message: format!(
                        "expected {} fields, found {}",
                        self.header.len(),
                        fields.len()
                    ),
                });
            }
            return Ok(Some(Row {
                header: Arc::clone(&self.header),
                fields,
                line: self.line,
            }));
        }
    }

    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let mut batch = Vec::with_capacity(self.chunk_size);
        while batch.len() < self.chunk_size {
            match self.next_row()? {
                Some(row) => batch.push(row),
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}

impl<R: BufRead> Iterator for ChunkedTable<R> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Stream every row of `table`, calling `on_row` once per row in file order.
///
/// Returns the number of rows read. Stops at the first error, whether it
/// comes from the reader or from `on_row`.
pub fn for_each_row<F>(
    source: &dyn TableSource,
    table: &str,
    chunk_size: usize,
    required: &[&str],
    mut on_row: F,
) -> Result<u64>
where
    F: FnMut(&Row) -> Result<()>,
{
    let chunks = ChunkedTable::open(source, table, chunk_size)?;
    chunks.require_columns(required.iter().copied())?;

    let mut rows = 0u64;
    for (n, batch) in chunks.enumerate() {
        let batch = batch?;
        tracing::debug!(table, batch = n, rows = batch.len(), "batch");
        for row in &batch {
            on_row(row)?;
        }
        rows += batch.len() as u64;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(text: &str, chunk: usize) -> ChunkedTable<Cursor<&[u8]>> {
        ChunkedTable::new("T.csv", Cursor::new(text.as_bytes()), chunk).unwrap()
    }

    #[test]
    fn detects_delimiter_from_header() {
        assert_eq!(Delimiter::detect("a,b,c"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a\tb\tc"), Delimiter::Tab);
        assert_eq!(Delimiter::detect("single"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a,b\tc"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("a\tb,c\td"), Delimiter::Tab);
    }

    #[test]
    fn labels_rows_with_header() {
        let t = table("concept_id\tconcept_name\n1\tFoo, bar\n2\tBaz\n", 10);
        assert_eq!(t.delimiter(), Delimiter::Tab);
        let batches: Vec<Batch> = t.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].get("concept_name"), Some("Foo, bar"));
        assert_eq!(batches[0][1].get("concept_id"), Some("2"));
        assert_eq!(batches[0][1].get("missing"), None);
        assert_eq!(batches[0][1].line(), 3);
    }

    #[test]
    fn batches_are_bounded_and_last_may_be_short() {
        let t = table("id\n1\n2\n3\n4\n5\n", 2);
        let sizes: Vec<usize> = t.map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn fields_are_taken_literally() {
        let t = table("a,b\n\"x,y\n", 5);
        let result: Vec<_> = t.collect();
        // The quote does not protect the comma.
        let row = &result[0].as_ref().unwrap()[0];
        assert_eq!(row.get("a"), Some("\"x"));
        assert_eq!(row.get("b"), Some("y"));
    }

    #[test]
    fn skips_blank_lines_and_strips_crlf() {
        let t = table("a,b\r\n1,2\r\n\r\n3,4\r\n", 10);
        let rows: Vec<Row> = t.flat_map(|b| b.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("b"), Some("4"));
        assert_eq!(rows[1].line(), 4);
    }

    #[test]
    fn ragged_row_is_a_parse_error_and_ends_the_stream() {
        let mut t = table("a,b\n1,2\n3\n5,6\n", 1);
        assert!(t.next().unwrap().is_ok());
        match t.next() {
            Some(Err(PipelineError::Parse { line, .. })) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(t.next().is_none());
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut t = ChunkedTable::new("T.csv", Cursor::new(&b"a,b\n1,2\n\xff,1\n"[..]), 1).unwrap();
        assert!(t.next().unwrap().is_ok());
        match t.next() {
            Some(Err(PipelineError::Parse { line, table, .. })) => {
                assert_eq!(line, 3);
                assert_eq!(table, "T.csv");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(t.next().is_none());

        let err = ChunkedTable::new("T.csv", Cursor::new(&b"\xff\n"[..]), 1).err().unwrap();
        assert!(matches!(err, PipelineError::Parse { line: 1, .. }));
    }

    #[test]
    fn empty_table_has_no_header() {
        let err = ChunkedTable::new("T.csv", Cursor::new(&b""[..]), 10).err().unwrap();
        assert!(matches!(err, PipelineError::Parse { line: 1, .. }));
    }

    #[test]
    fn header_only_table_yields_nothing() {
        let mut t = table("a,b\n", 10);
        assert!(t.next().is_none());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = ChunkedTable::new("T.csv", Cursor::new(&b"a\n"[..]), 0).err().unwrap();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn require_columns_names_the_missing_one() {
        let t = table("a,b\n", 10);
        t.require_columns(["a", "b"]).unwrap();
        match t.require_columns(["a", "c"]) {
            Err(PipelineError::MissingColumn { column, table }) => {
                assert_eq!(column, "c");
                assert_eq!(table, "T.csv");
            }
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn memory_source_reports_unknown_table() {
        let source = MemoryTables::new().with_table("A.csv", "x\n1\n");
        assert!(ChunkedTable::open(&source, "A.csv", 5).is_ok());
        assert!(matches!(
            ChunkedTable::open(&source, "B.csv", 5).err().unwrap(),
            PipelineError::Io { .. }
        ));
    }

    #[test]
    fn vocabulary_dir_reads_files_and_lists_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.csv"), "\u{feff}x\ty\n1\t2\n").unwrap();
        let source = VocabularyDir::new(dir.path());

        assert_eq!(source.missing_tables(&["A.csv", "B.csv"]), vec!["B.csv"]);

        let mut t = ChunkedTable::open(&source, "A.csv", 4).unwrap();
        assert_eq!(t.header(), ["x".to_string(), "y".to_string()]);
        let batch = t.next().unwrap().unwrap();
        assert_eq!(batch[0].get("y"), Some("2"));

        match ChunkedTable::open(&source, "B.csv", 4).err().unwrap() {
            PipelineError::Io { table, .. } => assert!(table.ends_with("B.csv")),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn for_each_row_visits_rows_in_order() {
        let source = MemoryTables::new().with_table("A.csv", "x\n1\n2\n3\n");
        let mut seen = Vec::new();
        let rows = for_each_row(&source, "A.csv", 2, &["x"], |row| {
            seen.push(row.get("x").unwrap_or_default().to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn every_row_arrives_once_in_bounded_batches(
            values in proptest::collection::vec("[a-z0-9]{0,6}", 0..60),
            chunk in 1usize..8,
        ) {
            let mut text = String::from("k\tv\n");
            for (i, v) in values.iter().enumerate() {
                text.push_str(&format!("{i}\t{v}\n"));
            }
            let t = ChunkedTable::new("T.tsv", Cursor::new(text.as_bytes()), chunk).unwrap();
            let batches: Vec<Batch> = t.map(|b| b.unwrap()).collect();

            for b in &batches {
                prop_assert!(!b.is_empty() && b.len() <= chunk);
            }
            let keys: Vec<String> = batches
                .iter()
                .flatten()
                .map(|r| r.get("k").unwrap_or_default().to_string())
                .collect();
            let expected: Vec<String> = (0..values.len()).map(|i| i.to_string()).collect();
            prop_assert_eq!(keys, expected);
        }

        #[test]
        fn tab_needs_strictly_more_columns(cols in 1usize..10) {
            let names: Vec<String> = (0..cols).map(|i| format!("c{i}")).collect();
            prop_assert_eq!(Delimiter::detect(&names.join(",")), Delimiter::Comma);
            let expected = if cols > 1 { Delimiter::Tab } else { Delimiter::Comma };
            prop_assert_eq!(Delimiter::detect(&names.join("\t")), expected);
        }
    }
}
