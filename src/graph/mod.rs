//! The document similarity graph.
//!
//! A [`Graph`] maps each document id to its neighbor edges. Keys keep record
//! order and edges keep descending-score order, so the JSON artifact is
//! byte-for-byte reproducible for the same inputs.

mod builder;

pub use builder::{DEFAULT_K, DEFAULT_THRESHOLD, GraphBuilder, GraphParams};

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::artifact::write_atomic;
use crate::error::{PipelineError, PipelineResult};

/// A weighted link to a similar document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub score: f32,
}

/// Adjacency lists keyed by document id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph {
    nodes: IndexMap<String, Vec<Edge>>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: IndexMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, id: String, edges: Vec<Edge>) {
        self.nodes.insert(id, edges);
    }

    /// Edges of `id`, or `None` for an unknown document.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Option<&[Edge]> {
        self.nodes.get(id).map(Vec::as_slice)
    }

    /// Neighbor ids of `id` in score order.
    #[must_use]
    pub fn related_ids(&self, id: &str) -> Vec<String> {
        self.neighbors(id)
            .map(|edges| edges.iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Vec<Edge>> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of documents (including ones without edges).
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    /// Write the graph as pretty-printed JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        write_atomic(path, |w| {
            serde_json::to_writer_pretty(&mut *w, self)?;
            w.write_all(b"\n")
        })?;
        tracing::info!(
            path = %path.display(),
            nodes = self.len(),
            edges = self.edge_count(),
            "graph saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let file = File::open(path).map_err(|e| PipelineError::read(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| PipelineError::read(path, e))
    }
}

impl<'a> IntoIterator for &'a Graph {
    type Item = (&'a String, &'a Vec<Edge>);
    type IntoIter = indexmap::map::Iter<'a, String, Vec<Edge>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
