//! All-or-nothing artifact writes.
//!
//! Artifacts are written to a temporary file in the destination directory
//! and renamed over the target only after every byte was flushed, so a
//! failed phase never leaves a half-written matrix, index, or graph behind.

use crate::error::{PipelineError, PipelineResult};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `path` through `fill`, replacing any previous file atomically.
pub fn write_atomic<F>(path: &Path, fill: F) -> PipelineResult<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::write(path, e))?;

    let temp = NamedTempFile::new_in(parent).map_err(|e| PipelineError::write(path, e))?;
    let mut writer = BufWriter::new(temp);

    fill(&mut writer).map_err(|e| PipelineError::write(path, e))?;
    let temp = writer
        .into_inner()
        .map_err(|e| PipelineError::write(path, e.error()))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::write(path, e))?;

    temp.persist(path)
        .map_err(|e| PipelineError::write(path, e.error))?;

    tracing::debug!(path = %path.display(), "artifact written");
    Ok(())
}
