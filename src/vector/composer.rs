//! Weighted composition of field embeddings into document vectors.
//!
//! `vector = w_title * title + w_summary * summary + w_tags * mean(tags)`
//!
//! Each field embedding is L2-normalized first; the combined vector is not
//! renormalized, so its magnitude (and every inner-product score computed
//! from it) depends on the weights and on whether the document has tags.

use std::sync::Arc;

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::records::{DocumentRecord, RecordSet};
use crate::vector::{EmbeddingGenerator, VectorDimension, VectorError, VectorMatrix, l2_normalize};

/// Per-field weights for document vectors.
///
/// The defaults sum to 1.0, but any finite weights are accepted and the
/// result is never rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldWeights {
    #[serde(default = "default_title_weight")]
    pub title: f32,
    #[serde(default = "default_summary_weight")]
    pub summary: f32,
    #[serde(default = "default_tags_weight")]
    pub tags: f32,
}

fn default_title_weight() -> f32 {
    0.4
}
fn default_summary_weight() -> f32 {
    0.1
}
fn default_tags_weight() -> f32 {
    0.5
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: default_title_weight(),
            summary: default_summary_weight(),
            tags: default_tags_weight(),
        }
    }
}

impl FieldWeights {
    /// Reject NaN and infinite weights.
    pub fn validate(&self) -> Result<(), VectorError> {
        for (field, value) in [
            ("title", self.title),
            ("summary", self.summary),
            ("tags", self.tags),
        ] {
            if !value.is_finite() {
                return Err(VectorError::InvalidWeight {
                    field,
                    value,
                    reason: "Weights must be finite",
                });
            }
        }
        Ok(())
    }

    /// Sum of the three weights.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.title + self.summary + self.tags
    }
}

/// Builds document vectors from records using an injected embedding generator.
#[derive(Clone)]
pub struct EmbeddingComposer {
    generator: Arc<dyn EmbeddingGenerator>,
    weights: FieldWeights,
}

impl std::fmt::Debug for EmbeddingComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingComposer")
            .field("dimension", &self.generator.dimension())
            .field("weights", &self.weights)
            .finish()
    }
}

impl EmbeddingComposer {
    pub fn new(
        generator: Arc<dyn EmbeddingGenerator>,
        weights: FieldWeights,
    ) -> Result<Self, VectorError> {
        weights.validate()?;
        Ok(Self { generator, weights })
    }

    #[must_use]
    pub fn weights(&self) -> FieldWeights {
        self.weights
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.generator.dimension()
    }

    /// Compose the document vector for a single record.
    pub fn compose(&self, record: &DocumentRecord) -> PipelineResult<Vec<f32>> {
        let dimension = self.dimension();
        let dim = dimension.get();

        let mut texts: Vec<&str> = Vec::with_capacity(2 + record.tags.len());
        texts.push(&record.title);
        texts.push(&record.summary);
        texts.extend(record.tags.iter().map(String::as_str));

        let mut embeddings = self
            .generator
            .generate_embeddings(&texts)
            .map_err(|e| PipelineError::embedding(&record.id, e))?;

        if embeddings.len() != texts.len() {
            return Err(PipelineError::embedding(
                &record.id,
                format!(
                    "requested {} embeddings, received {}",
                    texts.len(),
                    embeddings.len()
                ),
            ));
        }
        for embedding in &mut embeddings {
            dimension
                .validate_vector(embedding)
                .map_err(|e| PipelineError::embedding(&record.id, e))?;
            l2_normalize(embedding);
        }

        let (fields, tags) = embeddings.split_at(2);
        let (title, summary) = (&fields[0], &fields[1]);

        let mut tag_mean = vec![0.0f32; dim];
        if !tags.is_empty() {
            for tag in tags {
                for (acc, value) in tag_mean.iter_mut().zip(tag) {
                    *acc += value;
                }
            }
            let count = tags.len() as f32;
            for value in &mut tag_mean {
                *value /= count;
            }
        }

        let FieldWeights {
            title: w_title,
            summary: w_summary,
            tags: w_tags,
        } = self.weights;

        Ok((0..dim)
            .map(|i| w_title * title[i] + w_summary * summary[i] + w_tags * tag_mean[i])
            .collect())
    }

    /// Compose every record in parallel; row `i` belongs to record `i`.
    ///
    /// Fails as a whole on the first record that cannot be embedded.
    pub fn compose_all(
        &self,
        records: &RecordSet,
        progress: Option<&ProgressBar>,
    ) -> PipelineResult<VectorMatrix> {
        let rows = records
            .as_slice()
            .par_iter()
            .map(|record| {
                let vector = self.compose(record);
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                vector
            })
            .collect::<PipelineResult<Vec<Vec<f32>>>>()?;

        VectorMatrix::from_rows(rows).map_err(|e| PipelineError::IndexBuild {
            reason: e.to_string(),
        })
    }
}
