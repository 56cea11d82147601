//! Write graph neighbors back into note front matter as a `related` list.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::artifact::write_atomic;
use crate::error::{PipelineError, PipelineResult};
use crate::graph::Graph;
use crate::vault::front_matter::{self, FrontMatter};

const RELATED_KEY: &str = "related";

/// Outcome of an injection pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InjectReport {
    pub updated: usize,
    pub unchanged: usize,
}

impl InjectReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.updated + self.unchanged
    }
}

/// Rewrites the `related` field of notes inside one vault.
#[derive(Debug, Clone)]
pub struct Injector {
    vault: PathBuf,
}

impl Injector {
    pub fn new(vault: impl Into<PathBuf>) -> Self {
        Self {
            vault: vault.into(),
        }
    }

    /// Inject every node of `graph`, in graph order.
    pub fn inject_graph(&self, graph: &Graph) -> PipelineResult<InjectReport> {
        let mut report = InjectReport::default();
        for (id, edges) in graph {
            let related: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
            if self.inject_note(id, &related)? {
                report.updated += 1;
            } else {
                report.unchanged += 1;
            }
        }

        tracing::info!(
            vault = %self.vault.display(),
            updated = report.updated,
            unchanged = report.unchanged,
            "related links injected"
        );
        Ok(report)
    }

    /// Set `related` on one note. Returns whether the file was rewritten.
    pub fn inject_note(&self, id: &str, related: &[String]) -> PipelineResult<bool> {
        let path = self.note_path(id)?;
        let text = fs::read_to_string(&path).map_err(|e| PipelineError::read(&path, e))?;

        let updated = rewrite_related(&text, related).map_err(|e| PipelineError::DocumentFormat {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if updated == text {
            tracing::debug!(id, "related links already current");
            return Ok(false);
        }

        let permissions = fs::metadata(&path)
            .map_err(|e| PipelineError::read(&path, e))?
            .permissions();
        write_atomic(&path, |w| w.write_all(updated.as_bytes()))?;
        fs::set_permissions(&path, permissions).map_err(|e| PipelineError::write(&path, e))?;

        tracing::debug!(id, related = related.len(), "note updated");
        Ok(true)
    }

    fn note_path(&self, id: &str) -> PipelineResult<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.is_empty() || escapes {
            return Err(PipelineError::input(
                "graph",
                format!("note id '{id}' does not name a file inside the vault"),
            ));
        }
        Ok(self.vault.join(relative))
    }
}

#[derive(Serialize)]
struct Related<'a> {
    related: &'a [String],
}

/// Why a note's front matter could not be rewritten.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Front matter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Front matter must be a mapping, found {0}")]
    NotMapping(&'static str),

    #[error("Replacing '{RELATED_KEY}' would alter other front matter fields")]
    Disturbed,
}

/// Replace the top-level `related` entry of a note's front matter.
///
/// Every other header line and the body are kept byte-for-byte. The new entry
/// goes at the end of the header; a note without front matter gets one.
///
/// The rewritten header is parsed again and compared with the original, so a
/// layout the line-based rewrite cannot handle is rejected instead of written.
pub fn rewrite_related(text: &str, related: &[String]) -> Result<String, RewriteError> {
    let newline = if text.split('\n').next().is_some_and(|l| l.ends_with('\r')) {
        "\r\n"
    } else {
        "\n"
    };
    let block = serde_yaml::to_string(&Related { related })?;
    let block = block.trim_end().replace('\n', newline);

    let Some(front) = FrontMatter::locate(text) else {
        return Ok(format!("---{newline}{block}{newline}---{newline}{text}"));
    };

    let header = front.header(text);
    let mut kept = strip_related(header);
    // Drop blank lines left at the end so re-runs stay stable.
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    let rest = &text[front.header.end..];
    let mut out = String::with_capacity(text.len() + block.len() + 8);
    out.push_str(&text[..front.header.start]);
    for line in &kept {
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push_str(newline);
    }
    out.push_str(&block);
    // `---\n---\n` has no line break before the closing fence
    if !rest.starts_with('\n') && !rest.starts_with("\r\n") {
        out.push_str(newline);
    }
    out.push_str(rest);

    verify_rewrite(header, &out, related)?;
    Ok(out)
}

/// Header lines with the top-level `related` entry removed.
///
/// Blank and column-0 comment lines count as part of the entry only when
/// another item of the entry follows them.
fn strip_related(header: &str) -> Vec<&str> {
    let lines: Vec<&str> = header.split('\n').collect();
    let mut kept = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if !is_related_key(lines[i]) {
            kept.push(lines[i]);
            i += 1;
            continue;
        }

        i += 1;
        loop {
            let mut next = i;
            while next < lines.len() && is_filler(lines[next]) {
                next += 1;
            }
            if next < lines.len() && is_continuation(lines[next]) {
                i = next + 1;
            } else {
                break;
            }
        }
    }
    kept
}

fn verify_rewrite(before: &str, after: &str, related: &[String]) -> Result<(), RewriteError> {
    let header = FrontMatter::locate(after)
        .map(|front| front.header(after))
        .unwrap_or_default();

    let mut original = header_fields(before)?;
    let mut rewritten = header_fields(header)?;
    original.remove(RELATED_KEY);
    let written = rewritten.remove(RELATED_KEY);

    let expected = serde_yaml::to_value(related)?;
    if original != rewritten || written.as_ref() != Some(&expected) {
        return Err(RewriteError::Disturbed);
    }
    Ok(())
}

fn header_fields(header: &str) -> Result<Mapping, RewriteError> {
    if header.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str(header)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(RewriteError::NotMapping(front_matter::kind(&other))),
    }
}

fn is_related_key(line: &str) -> bool {
    line.strip_prefix(RELATED_KEY)
        .is_some_and(|rest| rest.trim_start_matches([' ', '\t']).starts_with(':'))
}

fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t', '-']) && !line.starts_with("---")
}

fn is_filler(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}
