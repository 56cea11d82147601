//! Turn a vault of Markdown notes into document records.

use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;
use serde_yaml::Value;
use walkdir::{DirEntry, WalkDir};

use crate::error::{PipelineError, PipelineResult};
use crate::records::{DocumentRecord, RecordSet, write_jsonl};
use crate::vault::front_matter::{self, kind, scalar_to_string};

/// Walks a vault directory and extracts one record per `*.md` note.
#[derive(Debug, Clone)]
pub struct VaultExtractor {
    root: PathBuf,
}

impl VaultExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Note paths in deterministic (file-name sorted, depth-first) order.
    ///
    /// Hidden directories such as `.obsidian` or `.git` are not descended into.
    pub fn note_paths(&self) -> PipelineResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                PipelineError::read(path, e)
            })?;
            if entry.file_type().is_file() && is_markdown(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        Ok(paths)
    }

    /// Extract every note into a validated record set.
    pub fn extract(&self) -> PipelineResult<RecordSet> {
        let paths = self.note_paths()?;
        tracing::debug!(root = %self.root.display(), notes = paths.len(), "scanning vault");

        let records = paths
            .par_iter()
            .map(|path| {
                let text = std::fs::read_to_string(path).map_err(|e| PipelineError::read(path, e))?;
                parse_note(self.note_id(path)?, &text, path)
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        RecordSet::new(records, &self.root.display().to_string())
    }

    /// Extract and write the records as JSONL; returns the note count.
    pub fn extract_to(&self, out: &Path) -> PipelineResult<usize> {
        let records = self.extract()?;
        write_jsonl(out, records.as_slice())?;
        tracing::info!(
            vault = %self.root.display(),
            path = %out.display(),
            notes = records.len(),
            "records extracted"
        );
        Ok(records.len())
    }

    /// Vault-relative path with `/` separators.
    fn note_id(&self, path: &Path) -> PipelineResult<String> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|e| PipelineError::read(path, e))?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Ok(parts.join("/"))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Build a record from a note's text.
pub fn parse_note(id: String, text: &str, path: &Path) -> PipelineResult<DocumentRecord> {
    let (header, body) = front_matter::parse(text, path)?;

    let title = match header.get("title") {
        None | Some(Value::Null) => String::new(),
        Some(value) => scalar_to_string(value).ok_or_else(|| PipelineError::DocumentFormat {
            path: path.to_path_buf(),
            reason: format!("'title' must be a scalar, found {}", kind(value)),
        })?,
    };

    let tags = match header.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                scalar_to_string(item).ok_or_else(|| PipelineError::DocumentFormat {
                    path: path.to_path_buf(),
                    reason: format!("'tags' entries must be scalars, found {}", kind(item)),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?,
        Some(value) => match scalar_to_string(value) {
            Some(tag) => vec![tag],
            None => {
                return Err(PipelineError::DocumentFormat {
                    path: path.to_path_buf(),
                    reason: format!("'tags' must be a list or a string, found {}", kind(value)),
                });
            }
        },
    };

    Ok(DocumentRecord {
        id,
        title,
        summary: first_paragraph(body),
        tags,
    })
}

/// First non-blank paragraph, trimmed, with inner line breaks folded to spaces.
pub fn first_paragraph(body: &str) -> String {
    let body = body.replace("\r\n", "\n");
    body.split("\n\n")
        .map(str::trim)
        .find(|para| !para.is_empty())
        .map(|para| para.replace('\n', " "))
        .unwrap_or_default()
}
