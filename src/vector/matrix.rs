//! Dense row-major vector matrix.
//!
//! Row `i` is the document vector of record `i`. The matrix is the unit of
//! persistence for the embedding phase and the input of the similarity index.

use crate::vector::{VectorDimension, VectorError};
use sha2::{Digest, Sha256};

/// N×D matrix of `f32` stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatrix {
    dimension: VectorDimension,
    data: Vec<f32>,
}

impl VectorMatrix {
    /// Assemble a matrix from rows that must all share one dimension.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, VectorError> {
        let first = rows.first().ok_or(VectorError::EmptyMatrix)?;
        let dimension = VectorDimension::new(first.len())?;

        let mut data = Vec::with_capacity(rows.len() * dimension.get());
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != dimension.get() {
                return Err(VectorError::RaggedRow {
                    row,
                    expected: dimension.get(),
                    actual: values.len(),
                });
            }
            data.extend_from_slice(&values);
        }

        Ok(Self { dimension, data })
    }

    /// Wrap flat row-major data.
    pub fn from_flat(dimension: VectorDimension, data: Vec<f32>) -> Result<Self, VectorError> {
        if data.is_empty() {
            return Err(VectorError::EmptyMatrix);
        }
        if data.len() % dimension.get() != 0 {
            return Err(VectorError::DimensionMismatch {
                expected: dimension.get(),
                actual: data.len() % dimension.get(),
            });
        }
        Ok(Self { dimension, data })
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Number of rows (documents).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    /// Panics if `i >= self.rows()`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        let dim = self.dimension.get();
        &self.data[i * dim..(i + 1) * dim]
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dimension.get())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// First non-finite value as `(row, column)`, if any.
    #[must_use]
    pub fn find_non_finite(&self) -> Option<(usize, usize)> {
        let dim = self.dimension.get();
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|i| (i / dim, i % dim))
    }

    /// SHA-256 over the dimension, row count and little-endian values.
    ///
    /// Two matrices share a fingerprint exactly when they are bit-identical.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.dimension.get() as u64).to_le_bytes());
        hasher.update((self.rows() as u64).to_le_bytes());
        for value in &self.data {
            hasher.update(value.to_le_bytes());
        }
        hasher.finalize().into()
    }
}

/// Inner product of two equally long slices.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
