//! Configuration module for the vault similarity pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `VG_` and use double underscores
//! to separate nested levels:
//! - `VG_GRAPH__THRESHOLD=0.3` sets `graph.threshold`
//! - `VG_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `VG_EMBEDDING__WEIGHTS__TAGS=0.6` sets `embedding.weights.tags`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::graph::GraphParams;
use crate::vector::FieldWeights;

/// Directory holding the settings file and, by default, every artifact.
pub const CONFIG_DIR: &str = ".vaultgraph";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .vaultgraph is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    /// Artifact locations
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Neighbor count and score threshold
    #[serde(default)]
    pub graph: GraphParams,

    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// JSONL document records
    #[serde(default = "default_records_path")]
    pub records: PathBuf,

    /// Vector matrix artifact
    #[serde(default = "default_vectors_path")]
    pub vectors: PathBuf,

    /// Similarity index artifact
    #[serde(default = "default_index_path")]
    pub index: PathBuf,

    /// Graph JSON artifact
    #[serde(default = "default_graph_path")]
    pub graph: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded model files are cached (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub show_download_progress: bool,

    /// Per-field weights of the document vector
    #[serde(default)]
    pub weights: FieldWeights,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexingConfig {
    /// Number of worker threads for embedding and graph building
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_records_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("records.jsonl")
}
fn default_vectors_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("vectors.bin")
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index.bin")
}
fn default_graph_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("graph.json")
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            debug: false,
            paths: PathsConfig::default(),
            embedding: EmbeddingConfig::default(),
            graph: GraphParams::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            records: default_records_path(),
            vectors: default_vectors_path(),
            index: default_index_path(),
            graph: default_graph_path(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            cache_dir: None,
            show_download_progress: true,
            weights: FieldWeights::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .vaultgraph directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    ///
    /// The workspace root becomes the directory containing the settings
    /// directory, so relative artifact paths resolve next to it.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let path = path.as_ref();
        Self::figment(path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = path
                        .parent()
                        .and_then(Path::parent)
                        .filter(|root| !root.as_os_str().is_empty())
                        .map(Path::to_path_buf);
                }
                settings
            })
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with VG_ prefix
            // Use double underscore (__) to separate nested levels
            // Single underscore (_) remains as is within field names
            .merge(Env::prefixed("VG_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
    }

    /// Find the workspace root by looking for .vaultgraph directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(SETTINGS_FILE))
    }

    /// Get the workspace root directory (where .vaultgraph is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Resolve a configured path against the workspace root.
    ///
    /// Absolute paths and paths without a known workspace are returned as-is.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Check the values figment cannot check through types alone.
    pub fn validate(&self) -> PipelineResult<()> {
        self.graph.validate()?;
        self.embedding
            .weights
            .validate()
            .map_err(|e| PipelineError::Config {
                reason: e.to_string(),
            })?;
        if self.indexing.parallel_threads == 0 {
            return Err(PipelineError::Config {
                reason: "indexing.parallel_threads must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> PipelineResult<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config {
            reason: e.to_string(),
        })
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        let toml_string = self.to_toml()?;
        crate::artifact::write_atomic(path, |w| w.write_all(toml_string.as_bytes()))
    }

    /// Create a default settings file with helpful comments inside `root`
    pub fn init_config_file(root: &Path, force: bool) -> PipelineResult<PathBuf> {
        let config_path = root.join(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err(PipelineError::Config {
                reason: format!(
                    "configuration file already exists at {}. Use --force to overwrite",
                    config_path.display()
                ),
            });
        }

        let template = format!(
            r#"# vaultgraph configuration file

# Version of the configuration schema
version = 1

# Global debug mode (same as --verbose)
debug = false

[paths]
# Artifact locations, relative to the directory containing .vaultgraph
records = ".vaultgraph/records.jsonl"
vectors = ".vaultgraph/vectors.bin"
index = ".vaultgraph/index.bin"
graph = ".vaultgraph/graph.json"

[embedding]
# Model to use for embeddings
model = "{model}"

# Model cache directory (defaults to the user cache directory)
# cache_dir = "{cache}"

show_download_progress = true

[embedding.weights]
# Document vector = title * w_title + summary * w_summary + mean(tags) * w_tags
# The combined vector is not renormalized.
title = {title}
summary = {summary}
tags = {tags}

[graph]
# Maximum neighbors per document
k = {k}

# Minimum inner-product score for an edge
threshold = {threshold}

[indexing]
# Number of worker threads (defaults to CPU count)
# parallel_threads = {threads}
"#,
            model = default_embedding_model(),
            cache = crate::vector::default_models_dir().display(),
            title = FieldWeights::default().title,
            summary = FieldWeights::default().summary,
            tags = FieldWeights::default().tags,
            k = GraphParams::default().k,
            threshold = GraphParams::default().threshold,
            threads = num_cpus::get(),
        );

        crate::artifact::write_atomic(&config_path, |w| w.write_all(template.as_bytes()))?;
        tracing::info!(path = %config_path.display(), force, "configuration written");

        Ok(config_path)
    }
}
