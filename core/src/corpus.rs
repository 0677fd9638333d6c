//! Tab-delimited corpus reading and document lookup.
//!
//! A corpus source is a single file or a directory of `.txt`/`.tsv` files.
//! Each line is one record; a record is accepted only when it has exactly
//! [`CorpusLayout::fields`] tab-separated fields and a numeric id column.

use crate::error::{Error, Result};
use crate::DocId;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusLayout {
    pub fields: usize,
    pub id_column: usize,
    pub content_column: usize,
}

impl Default for CorpusLayout {
    fn default() -> Self {
        Self { fields: 5, id_column: 1, content_column: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub doc_id: DocId,
    pub content: String,
}

/// Why a line was dropped while reading a corpus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("expected {expected} tab-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("document id {value:?} is not numeric")]
    InvalidId { value: String },
}

impl CorpusLayout {
    pub fn parse_record(&self, line: &str) -> std::result::Result<Record, RecordError> {
        let fields: Vec<&str> = line.split('\t').collect();
        let field_count = RecordError::FieldCount { expected: self.fields, found: fields.len() };
        if fields.len() != self.fields {
            return Err(field_count);
        }
        let (Some(raw_id), Some(content)) = (fields.get(self.id_column), fields.get(self.content_column)) else {
            return Err(field_count);
        };
        let raw_id = raw_id.trim();
        let doc_id = raw_id
            .parse::<DocId>()
            .map_err(|_| RecordError::InvalidId { value: raw_id.to_string() })?;
        Ok(Record { doc_id, content: content.to_string() })
    }

    /// Whether both columns fall inside the field count.
    pub fn is_valid(&self) -> bool {
        self.id_column < self.fields && self.content_column < self.fields
    }
}

/// Line accounting for one pass over a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct CorpusSource {
    root: PathBuf,
    layout: CorpusLayout,
}

impl CorpusSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), layout: CorpusLayout::default() }
    }

    pub fn with_layout(mut self, layout: CorpusLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> CorpusLayout {
        self.layout
    }

    /// Resolve the files making up this source, in a stable order.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let meta = std::fs::metadata(&self.root).map_err(|e| Error::unreadable(&self.root, e))?;
        if meta.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                Error::unreadable(path, e.into())
            })?;
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("txt" | "tsv")) {
                files.push(p.to_path_buf());
            }
        }
        if files.is_empty() {
            return Err(Error::EmptySource(self.root.clone()));
        }
        Ok(files)
    }

    /// Feed every well-formed record to `sink`. Malformed lines are counted and
    /// skipped; only I/O failures end the pass early.
    pub fn for_each_record<F>(&self, mut sink: F) -> Result<ReadStats>
    where
        F: FnMut(Record),
    {
        let mut stats = ReadStats::default();
        for file in self.files()? {
            let f = File::open(&file).map_err(|e| Error::unreadable(&file, e))?;
            let mut reader = BufReader::new(f);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let n = reader.read_until(b'\n', &mut buf).map_err(|e| Error::unreadable(&file, e))?;
                if n == 0 {
                    break;
                }
                stats.lines += 1;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                match self.layout.parse_record(line) {
                    Ok(record) => {
                        stats.records += 1;
                        sink(record);
                    }
                    Err(err) => {
                        stats.skipped += 1;
                        tracing::debug!(file = %file.display(), line = stats.lines, %err, "skipping record");
                    }
                }
            }
        }
        Ok(stats)
    }

    pub fn records(&self) -> Result<(Vec<Record>, ReadStats)> {
        let mut records = Vec::new();
        let stats = self.for_each_record(|r| records.push(r))?;
        Ok((records, stats))
    }

    /// Re-scan the source and return the original content of the requested
    /// documents. The first record seen for an id wins.
    pub fn fetch_documents(&self, ids: &[DocId]) -> Result<HashMap<DocId, String>> {
        let wanted: HashSet<DocId> = ids.iter().copied().collect();
        let mut found: HashMap<DocId, String> = HashMap::with_capacity(wanted.len());
        if wanted.is_empty() {
            return Ok(found);
        }
        self.for_each_record(|record| {
            if wanted.contains(&record.doc_id) {
                found.entry(record.doc_id).or_insert(record.content);
            }
        })?;
        Ok(found)
    }
}
