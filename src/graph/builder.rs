//! k-nearest-neighbor graph construction.
//!
//! For each document the index is asked for `k + 1` neighbors: the document's
//! own vector always comes back and is dropped by id comparison. Documents
//! with identical content but different ids still link to each other.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::graph::{Edge, Graph};
use crate::records::RecordSet;
use crate::vector::{FlatIpIndex, Neighbor, VectorMatrix};

/// Default number of neighbors per document.
pub const DEFAULT_K: usize = 5;

/// Default minimum score for an edge, shared by the CLI and the config file.
pub const DEFAULT_THRESHOLD: f32 = 0.4;

/// Neighbor count and score cut-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphParams {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_k() -> usize {
    DEFAULT_K
}
fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl GraphParams {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.k == 0 {
            return Err(PipelineError::Config {
                reason: "k must be at least 1".to_string(),
            });
        }
        if self.threshold.is_nan() {
            return Err(PipelineError::Config {
                reason: "threshold must be a number".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds a [`Graph`] from aligned records, vectors, and index.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder {
    params: GraphParams,
}

impl GraphBuilder {
    pub fn new(params: GraphParams) -> PipelineResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> GraphParams {
        self.params
    }

    /// Link every document to at most `k` neighbors scoring at least `threshold`.
    pub fn build(
        &self,
        records: &RecordSet,
        matrix: &VectorMatrix,
        index: &FlatIpIndex,
    ) -> PipelineResult<Graph> {
        if records.len() != matrix.rows() {
            return Err(PipelineError::input(
                "vector matrix",
                format!(
                    "{} records were loaded but the matrix has {} rows",
                    records.len(),
                    matrix.rows()
                ),
            ));
        }
        index.ensure_built_from(matrix)?;

        let results = index.search(matrix, self.params.k + 1)?;

        let adjacency: Vec<Vec<Edge>> = results
            .par_iter()
            .enumerate()
            .map(|(i, hits)| self.edges_for(records, i, hits))
            .collect::<PipelineResult<_>>()?;

        let mut graph = Graph::with_capacity(records.len());
        for (record, edges) in records.iter().zip(adjacency) {
            graph.insert(record.id.clone(), edges);
        }

        tracing::info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            k = self.params.k,
            threshold = self.params.threshold,
            "graph built"
        );
        Ok(graph)
    }

    fn edges_for(
        &self,
        records: &RecordSet,
        i: usize,
        hits: &[Neighbor],
    ) -> PipelineResult<Vec<Edge>> {
        let records = records.as_slice();
        let source = &records[i].id;

        // Finite vectors can still overflow the inner product
        if let Some(hit) = hits.iter().find(|hit| !hit.score.is_finite()) {
            return Err(PipelineError::IndexQuery {
                reason: format!(
                    "score between '{source}' and '{}' is {}, document vectors are too large to compare",
                    records[hit.position].id, hit.score
                ),
            });
        }

        Ok(hits
            .iter()
            .filter(|hit| records[hit.position].id != *source)
            .filter(|hit| hit.score >= self.params.threshold)
            .take(self.params.k)
            .map(|hit| Edge {
                id: records[hit.position].id.clone(),
                score: hit.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DocumentRecord;
    use crate::vector::{
        EmbeddingComposer, EmbeddingGenerator, FieldWeights, VectorDimension, VectorError,
    };
    use std::sync::Arc;

    /// "rust" and "pasta" embed to orthogonal axes.
    struct TwoWordEmbedder;

    impl EmbeddingGenerator for TwoWordEmbedder {
        fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
            texts
                .iter()
                .map(|text| match *text {
                    "rust" => Ok(vec![1.0, 0.0]),
                    "pasta" => Ok(vec![0.0, 1.0]),
                    other => Err(VectorError::EmbeddingFailed(format!("unknown text {other}"))),
                })
                .collect()
        }

        fn dimension(&self) -> VectorDimension {
            VectorDimension::new(2).unwrap()
        }
    }

    fn records(ids: &[&str]) -> RecordSet {
        RecordSet::new(
            ids.iter()
                .map(|id| DocumentRecord::new(*id, "", "", Vec::new()))
                .collect(),
            "test",
        )
        .unwrap()
    }

    fn build(
        ids: &[&str],
        rows: Vec<Vec<f32>>,
        params: GraphParams,
    ) -> PipelineResult<Graph> {
        let matrix = VectorMatrix::from_rows(rows).unwrap();
        let index = FlatIpIndex::build(&matrix).unwrap();
        GraphBuilder::new(params)?.build(&records(ids), &matrix, &index)
    }

    #[test]
    fn test_identical_pair_and_orthogonal_outlier() {
        let graph = build(
            &["A", "B", "C"],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            GraphParams {
                k: 2,
                threshold: 0.5,
            },
        )
        .unwrap();

        assert_eq!(
            graph.neighbors("A").unwrap(),
            &[Edge {
                id: "B".into(),
                score: 1.0
            }]
        );
        assert_eq!(
            graph.neighbors("B").unwrap(),
            &[Edge {
                id: "A".into(),
                score: 1.0
            }]
        );
        assert!(graph.neighbors("C").unwrap().is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let graph = build(
            &["a", "b", "c"],
            vec![vec![1.0, 0.0], vec![0.5, 0.0], vec![0.25, 0.0]],
            GraphParams {
                k: 5,
                threshold: 0.5,
            },
        )
        .unwrap();

        let ids: Vec<String> = graph.related_ids("a");
        assert_eq!(ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_neg_infinity_threshold_keeps_everything() {
        let graph = build(
            &["a", "b", "c", "d"],
            vec![
                vec![1.0, 0.0],
                vec![-1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.6, 0.8],
            ],
            GraphParams {
                k: 3,
                threshold: f32::NEG_INFINITY,
            },
        )
        .unwrap();

        for (id, edges) in &graph {
            assert_eq!(edges.len(), 3, "{id}");
            assert!(edges.iter().all(|e| e.id != *id));
            assert!(edges.windows(2).all(|w| w[0].score >= w[1].score));
        }
        assert_eq!(graph.related_ids("a"), vec!["d", "c", "b"]);
    }

    #[test]
    fn test_at_most_k_edges_when_self_is_outranked() {
        // "small" scores itself 0.01 but scores "big" 1.0, so it is not
        // its own top hit and all k + 1 results are candidates.
        let graph = build(
            &["small", "big", "mid"],
            vec![vec![0.1, 0.0], vec![10.0, 0.0], vec![5.0, 0.0]],
            GraphParams {
                k: 1,
                threshold: f32::NEG_INFINITY,
            },
        )
        .unwrap();

        assert_eq!(graph.related_ids("small"), vec!["big"]);
        assert_eq!(graph.related_ids("mid"), vec!["big"]);
        assert_eq!(graph.related_ids("big"), vec!["mid"]);
    }

    #[test]
    fn test_misaligned_matrix_rejected() {
        let matrix = VectorMatrix::from_rows(vec![vec![1.0], vec![2.0]]).unwrap();
        let index = FlatIpIndex::build(&matrix).unwrap();
        let err = GraphBuilder::new(GraphParams::default())
            .unwrap()
            .build(&records(&["only"]), &matrix, &index)
            .unwrap_err();

        assert_eq!(err.status_code(), "INPUT_VALIDATION_ERROR");
    }

    #[test]
    fn test_stale_index_rejected() {
        let matrix = VectorMatrix::from_rows(vec![vec![1.0], vec![2.0]]).unwrap();
        let other = VectorMatrix::from_rows(vec![vec![1.0], vec![3.0]]).unwrap();
        let index = FlatIpIndex::build(&other).unwrap();

        let err = GraphBuilder::new(GraphParams::default())
            .unwrap()
            .build(&records(&["a", "b"]), &matrix, &index)
            .unwrap_err();

        assert_eq!(err.status_code(), "INDEX_QUERY_FAILURE");
    }

    #[test]
    fn test_invalid_params() {
        assert!(
            GraphBuilder::new(GraphParams {
                k: 0,
                threshold: 0.1
            })
            .is_err()
        );
        assert!(
            GraphBuilder::new(GraphParams {
                k: 1,
                threshold: f32::NAN
            })
            .is_err()
        );
    }

    #[test]
    fn test_composed_identical_records_score_one() {
        let record = |id: &str, word: &str| DocumentRecord::new(id, word, word, vec![word.into()]);
        let records = RecordSet::new(
            vec![
                record("A", "rust"),
                record("B", "rust"),
                record("C", "pasta"),
            ],
            "test",
        )
        .unwrap();
        let composer =
            EmbeddingComposer::new(Arc::new(TwoWordEmbedder), FieldWeights::default()).unwrap();
        let matrix = composer.compose_all(&records, None).unwrap();
        let index = FlatIpIndex::build(&matrix).unwrap();

        let graph = GraphBuilder::new(GraphParams {
            k: 2,
            threshold: 0.5,
        })
        .unwrap()
        .build(&records, &matrix, &index)
        .unwrap();

        for (id, other) in [("A", "B"), ("B", "A")] {
            let edges = graph.neighbors(id).unwrap();
            assert_eq!(edges.len(), 1, "{id}: {edges:?}");
            assert_eq!(edges[0].id, other);
            assert!((edges[0].score - 1.0).abs() < 1e-6, "{edges:?}");
        }
        assert!(graph.neighbors("C").unwrap().is_empty());
    }

    #[test]
    fn test_overflowing_scores_rejected() {
        // Each row is finite but the inner product exceeds f32::MAX
        let err = build(
            &["a", "b"],
            vec![vec![1e20, 0.0], vec![1e20, 0.0]],
            GraphParams::default(),
        )
        .unwrap_err();
        assert_eq!(err.status_code(), "INDEX_QUERY_FAILURE");
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
