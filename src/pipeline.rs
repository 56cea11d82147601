//! Phase orchestration: embed, index, graph.
//!
//! Each phase reads its inputs from artifacts on disk and writes exactly one
//! artifact before returning, so phases can be re-run independently and a
//! failing phase leaves earlier artifacts intact.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::display::{create_progress_bar, with_spinner};
use crate::error::PipelineResult;
use crate::graph::{Graph, GraphBuilder, GraphParams};
use crate::records::RecordSource;
use crate::vector::{EmbeddingComposer, FlatIpIndex, VectorMatrix, load_matrix, save_matrix};

/// Locations of the pipeline's on-disk artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub vectors: PathBuf,
    pub index: PathBuf,
    pub graph: PathBuf,
}

impl ArtifactPaths {
    /// Artifact paths from settings, resolved against the workspace root.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            vectors: settings.resolve(&settings.paths.vectors),
            index: settings.resolve(&settings.paths.index),
            graph: settings.resolve(&settings.paths.graph),
        }
    }
}

/// Counts reported after a phase finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStats {
    pub documents: usize,
    pub dimension: usize,
    pub edges: usize,
}

/// Runs the pipeline phases against one record source.
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    paths: ArtifactPaths,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(source: Arc<dyn RecordSource>, paths: ArtifactPaths) -> Self {
        Self {
            source,
            paths,
            show_progress: false,
        }
    }

    /// Show indicatif progress bars on stderr.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Compose one vector per record and write the vector matrix.
    pub fn run_embedding(&self, composer: &EmbeddingComposer) -> PipelineResult<PhaseStats> {
        let start = Instant::now();
        let records = self.source.load()?;
        tracing::info!(
            source = %self.source.describe(),
            documents = records.len(),
            dimension = composer.dimension().get(),
            "embedding documents"
        );

        let progress = self
            .show_progress
            .then(|| create_progress_bar(records.len() as u64, "Embedding"));
        let composed = composer.compose_all(&records, progress.as_ref());
        if let Some(bar) = &progress {
            bar.finish_and_clear();
        }
        let matrix = composed?;

        save_matrix(&self.paths.vectors, &matrix)?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedding phase complete"
        );

        Ok(PhaseStats {
            documents: matrix.rows(),
            dimension: matrix.dimension().get(),
            edges: 0,
        })
    }

    /// Build the similarity index from the saved vector matrix.
    pub fn run_indexing(&self) -> PipelineResult<PhaseStats> {
        let matrix = load_matrix(&self.paths.vectors)?;
        let index = with_spinner(self.show_progress, "Building index", || {
            FlatIpIndex::build(&matrix)
        })?;
        index.save(&self.paths.index)?;

        Ok(PhaseStats {
            documents: index.len(),
            dimension: index.dimension().get(),
            edges: 0,
        })
    }

    /// Query the index for every document and write the graph.
    pub fn run_graph(&self, params: GraphParams) -> PipelineResult<(Graph, PhaseStats)> {
        let builder = GraphBuilder::new(params)?;
        let records = self.source.load()?;
        let matrix: VectorMatrix = load_matrix(&self.paths.vectors)?;
        let index = FlatIpIndex::load(&self.paths.index)?;

        let graph = with_spinner(self.show_progress, "Linking documents", || {
            builder.build(&records, &matrix, &index)
        })?;
        graph.save(&self.paths.graph)?;

        let stats = PhaseStats {
            documents: graph.len(),
            dimension: matrix.dimension().get(),
            edges: graph.edge_count(),
        };
        Ok((graph, stats))
    }

    /// Run every phase in order, stopping at the first failure.
    pub fn run_all(
        &self,
        composer: &EmbeddingComposer,
        params: GraphParams,
    ) -> PipelineResult<(Graph, PhaseStats)> {
        // Reject bad parameters before spending time on embeddings
        params.validate()?;
        self.run_embedding(composer)?;
        self.run_indexing()?;
        self.run_graph(params)
    }
}
