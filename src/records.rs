//! Document records and the shared record loader.
//!
//! Every phase reads its records through a [`RecordSource`], and every
//! component downstream of loading receives a [`RecordSet`], which can only
//! be built through id validation.

use crate::artifact::write_atomic;
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Normalized representation of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable unique identity, e.g. the vault-relative path
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: summary.into(),
            tags,
        }
    }
}

/// Ordered records with unique, non-empty ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<DocumentRecord>,
}

impl RecordSet {
    /// Validate and wrap records; `origin` names the input in error messages.
    pub fn new(records: Vec<DocumentRecord>, origin: &str) -> PipelineResult<Self> {
        let positions: Vec<usize> = (1..=records.len()).collect();
        Self::validate(records, &positions, "record", origin)
    }

    fn validate(
        records: Vec<DocumentRecord>,
        lines: &[usize],
        unit: &str,
        origin: &str,
    ) -> PipelineResult<Self> {
        if records.is_empty() {
            return Err(PipelineError::input(origin, "no document records found"));
        }

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(records.len());
        for (record, &line) in records.iter().zip(lines) {
            if record.id.trim().is_empty() {
                return Err(PipelineError::input(
                    origin,
                    format!("{unit} {line} has an empty id"),
                ));
            }
            if let Some(first) = seen.insert(record.id.as_str(), line) {
                return Err(PipelineError::input(
                    origin,
                    format!(
                        "duplicate id '{}' on {unit}s {first} and {line}",
                        record.id
                    ),
                ));
            }
        }

        Ok(Self { records })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&DocumentRecord> {
        self.records.get(position)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<DocumentRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a DocumentRecord;
    type IntoIter = std::slice::Iter<'a, DocumentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Capability for loading the record stream produced by the extractor.
pub trait RecordSource: Send + Sync {
    fn load(&self) -> PipelineResult<RecordSet>;

    /// Human-readable origin for logs and errors.
    fn describe(&self) -> String;
}

/// Newline-delimited JSON records on disk.
#[derive(Debug, Clone)]
pub struct JsonlRecordSource {
    path: PathBuf,
}

impl JsonlRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonlRecordSource {
    fn load(&self) -> PipelineResult<RecordSet> {
        let file = File::open(&self.path).map_err(|e| PipelineError::read(&self.path, e))?;
        let records = parse_jsonl(BufReader::new(file), &self.describe())?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "loaded records");
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory records, mostly for tests and embedding callers.
#[derive(Debug, Clone)]
pub struct MemoryRecordSource {
    records: Vec<DocumentRecord>,
}

impl MemoryRecordSource {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for MemoryRecordSource {
    fn load(&self) -> PipelineResult<RecordSet> {
        RecordSet::new(self.records.clone(), &self.describe())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// Parse JSONL records, skipping blank lines.
pub fn parse_jsonl(reader: impl BufRead, origin: &str) -> PipelineResult<RecordSet> {
    let mut records = Vec::new();
    let mut lines = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| PipelineError::read(origin, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DocumentRecord = serde_json::from_str(&line).map_err(|e| {
            PipelineError::input(origin, format!("malformed record on line {line_no}: {e}"))
        })?;
        records.push(record);
        lines.push(line_no);
    }

    RecordSet::validate(records, &lines, "line", origin)
}

/// Write records as JSONL, replacing `path` atomically.
pub fn write_jsonl(path: &Path, records: &[DocumentRecord]) -> PipelineResult<()> {
    write_atomic(path, |writer| {
        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
}
