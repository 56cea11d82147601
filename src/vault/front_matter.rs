//! YAML front matter at the top of a Markdown note.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::error::{PipelineError, PipelineResult};

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)").expect("Invalid regex")
});

/// Byte layout of a note's front matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// YAML between the fences, without the line break before the closing fence.
    /// Empty (and positioned right after the opening fence) for `---\n---\n`.
    pub header: Range<usize>,
    /// Everything after the closing fence line.
    pub body_start: usize,
}

impl FrontMatter {
    /// Locate front matter at the very start of `text`.
    #[must_use]
    pub fn locate(text: &str) -> Option<Self> {
        let caps = FENCE.captures(text)?;
        let whole = caps.get(0)?;
        let header = match caps.get(1) {
            Some(m) => m.range(),
            None => {
                let opening_end = text.find('\n').map_or(whole.end(), |i| i + 1);
                opening_end..opening_end
            }
        };
        Some(Self {
            header,
            body_start: whole.end(),
        })
    }

    pub fn header<'a>(&self, text: &'a str) -> &'a str {
        &text[self.header.clone()]
    }

    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body_start..]
    }
}

/// Parse the front matter of `text` into a mapping plus the remaining body.
///
/// A note without front matter, or with an empty one, yields an empty mapping.
pub fn parse<'a>(text: &'a str, path: &Path) -> PipelineResult<(Mapping, &'a str)> {
    let Some(front) = FrontMatter::locate(text) else {
        return Ok((Mapping::new(), text));
    };
    if front.header(text).trim().is_empty() {
        return Ok((Mapping::new(), front.body(text)));
    }

    let value: Value =
        serde_yaml::from_str(front.header(text)).map_err(|e| PipelineError::DocumentFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        other => {
            return Err(PipelineError::DocumentFormat {
                path: path.to_path_buf(),
                reason: format!("front matter must be a mapping, found {}", kind(&other)),
            });
        }
    };
    Ok((mapping, front.body(text)))
}

/// Render a YAML scalar as plain text. Non-scalars yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
