//! Markdown vault integration.
//!
//! [`VaultExtractor`] produces the record file the pipeline consumes;
//! [`Injector`] writes the finished graph back into each note's front matter.

mod extract;
pub mod front_matter;
mod inject;

pub use extract::{VaultExtractor, first_paragraph, parse_note};
pub use front_matter::FrontMatter;
pub use inject::{InjectReport, Injector, RewriteError, rewrite_related};
