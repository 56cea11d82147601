//! Exact inner-product similarity index.
//!
//! Every query is compared against every stored vector, so recall is always
//! complete. Scores equal cosine similarity only when vectors are unit length;
//! document vectors are not renormalized, so scores are raw inner products.
//!
//! The index is immutable after [`FlatIpIndex::build`]. Queries take `&self`
//! and run in parallel across query rows.

use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;

use crate::error::{PipelineError, PipelineResult};
use crate::vector::storage::{METRIC_INNER_PRODUCT, load_index_file, save_index_file};
use crate::vector::{Neighbor, VectorDimension, VectorMatrix, dot};

/// Errors raised while building or querying the index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Cannot build an index over an empty matrix")]
    EmptyMatrix,

    #[error("Non-finite value at row {row}, column {column}")]
    NonFinite { row: usize, column: usize },

    #[error("Requested k must be at least 1")]
    InvalidK,

    #[error("Query dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Index is stale: it was built from a different vector matrix ({indexed} rows indexed, {queried} rows supplied)"
    )]
    Stale { indexed: usize, queried: usize },
}

impl IndexError {
    /// Whether this error belongs to the build step rather than a query.
    #[must_use]
    pub fn is_build_error(&self) -> bool {
        matches!(self, Self::EmptyMatrix | Self::NonFinite { .. })
    }
}

/// Flat (brute-force) inner-product index over a vector matrix.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    vectors: VectorMatrix,
    fingerprint: [u8; 32],
}

impl FlatIpIndex {
    /// Build the index from the full matrix in one shot.
    pub fn build(matrix: &VectorMatrix) -> Result<Self, IndexError> {
        if matrix.rows() == 0 {
            return Err(IndexError::EmptyMatrix);
        }
        if let Some((row, column)) = matrix.find_non_finite() {
            return Err(IndexError::NonFinite { row, column });
        }

        tracing::debug!(
            rows = matrix.rows(),
            dimension = matrix.dimension().get(),
            "built flat inner-product index"
        );

        Ok(Self {
            vectors: matrix.clone(),
            fingerprint: matrix.fingerprint(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.rows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.rows() == 0
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.vectors.dimension()
    }

    /// Fingerprint of the matrix this index was built from.
    #[must_use]
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Top-`k` neighbors of a single query vector.
    ///
    /// Returns `min(k, len)` hits sorted by descending score; exact ties are
    /// ordered by ascending position.
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        if query.len() != self.dimension().get() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension().get(),
                actual: query.len(),
            });
        }
        Ok(self.top_k(query, k))
    }

    /// Top-`k` neighbors for every row of `queries`, in row order.
    pub fn search(
        &self,
        queries: &VectorMatrix,
        k: usize,
    ) -> Result<Vec<Vec<Neighbor>>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        if queries.dimension() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension().get(),
                actual: queries.dimension().get(),
            });
        }

        Ok((0..queries.rows())
            .into_par_iter()
            .map(|i| self.top_k(queries.row(i), k))
            .collect())
    }

    /// Fail unless this index was built from exactly `matrix`.
    pub fn ensure_built_from(&self, matrix: &VectorMatrix) -> Result<(), IndexError> {
        if self.fingerprint != matrix.fingerprint() {
            return Err(IndexError::Stale {
                indexed: self.len(),
                queried: matrix.rows(),
            });
        }
        Ok(())
    }

    /// Persist the index as one artifact.
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        save_index_file(path, METRIC_INNER_PRODUCT, &self.fingerprint, &self.vectors)?;
        tracing::info!(path = %path.display(), vectors = self.len(), "similarity index saved");
        Ok(())
    }

    /// Load an index written by [`FlatIpIndex::save`], verifying its fingerprint.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let file = load_index_file(path)?;

        if file.metric != METRIC_INNER_PRODUCT {
            return Err(PipelineError::read(
                path,
                format!("unsupported index metric {}", file.metric),
            ));
        }
        if file.vectors.fingerprint() != file.fingerprint {
            return Err(PipelineError::read(
                path,
                "index contents do not match their fingerprint, the file is corrupted",
            ));
        }

        Ok(Self {
            vectors: file.vectors,
            fingerprint: file.fingerprint,
        })
    }

    fn top_k(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter_rows()
            .enumerate()
            .map(|(position, vector)| Neighbor::new(position, dot(query, vector)))
            .collect();

        let k = k.min(hits.len());
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, Neighbor::rank_cmp);
            hits.truncate(k);
        }
        hits.sort_unstable_by(Neighbor::rank_cmp);
        hits
    }
}
