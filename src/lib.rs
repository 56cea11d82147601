//! Semantic similarity graphs for Markdown note vaults.
//!
//! Notes are extracted into [`DocumentRecord`]s, embedded into a
//! [`vector::VectorMatrix`], indexed with an exact inner-product
//! [`vector::FlatIpIndex`], and linked into a k-nearest-neighbor [`Graph`]
//! that can be written back into each note's front matter.

pub mod artifact;
pub mod config;
pub mod display;
pub mod error;
pub mod graph;
pub mod io;
pub mod pipeline;
pub mod records;
pub mod vault;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{PipelineError, PipelineResult};
pub use graph::{Edge, Graph, GraphBuilder, GraphParams};
pub use pipeline::{ArtifactPaths, PhaseStats, Pipeline};
pub use records::{DocumentRecord, JsonlRecordSource, MemoryRecordSource, RecordSet, RecordSource};
pub use vault::{InjectReport, Injector, VaultExtractor};
pub use vector::{EmbeddingComposer, EmbeddingGenerator, FastEmbedGenerator, FieldWeights};
