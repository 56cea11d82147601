//! Document vectors and exact similarity search.
//!
//! # Architecture
//! Field embeddings come from an injected [`EmbeddingGenerator`]; the
//! [`EmbeddingComposer`] folds them into one vector per document and the
//! resulting [`VectorMatrix`] is persisted as a single artifact. A
//! [`FlatIpIndex`] is built from that matrix and answers top-k inner-product
//! queries without approximation.

mod composer;
mod embedding;
mod index;
mod matrix;
mod storage;
mod types;

// Re-export core types for public API
pub use composer::{EmbeddingComposer, FieldWeights};
#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, SUPPORTED_MODELS, default_models_dir, l2_normalize,
    model_to_string, parse_embedding_model,
};
pub use index::{FlatIpIndex, IndexError};
pub use matrix::{VectorMatrix, dot};
pub use storage::{VectorStorageError, load_matrix, save_matrix};
pub use types::{Neighbor, VectorDimension, VectorError};
