#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use vaultgraph::vector::{EmbeddingGenerator, VectorDimension, VectorError};
use vaultgraph::{ArtifactPaths, EmbeddingComposer, FieldWeights};

/// Deterministic embedder: one axis per vocabulary word, counting occurrences.
///
/// Words outside the vocabulary are ignored, so unrelated text embeds to the
/// zero vector.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

impl EmbeddingGenerator for KeywordEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.vocabulary.len()];
                for word in text.split(|c: char| !c.is_alphanumeric()) {
                    let word = word.to_lowercase();
                    if let Some(axis) = self.vocabulary.iter().position(|v| *v == word) {
                        vector[axis] += 1.0;
                    }
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(self.vocabulary.len()).expect("non-empty vocabulary")
    }
}

/// Fails for any batch containing `poison`.
pub struct FailingEmbedder {
    pub inner: KeywordEmbedder,
    pub poison: &'static str,
}

impl EmbeddingGenerator for FailingEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.contains(&self.poison) {
            return Err(VectorError::EmbeddingFailed(format!(
                "refusing to embed '{}'",
                self.poison
            )));
        }
        self.inner.generate_embeddings(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.inner.dimension()
    }
}

pub const VOCABULARY: &[&str] = &["rust", "python", "cooking", "garden", "memory", "pasta"];

pub fn keyword_composer() -> EmbeddingComposer {
    EmbeddingComposer::new(
        Arc::new(KeywordEmbedder::new(VOCABULARY)),
        FieldWeights::default(),
    )
    .expect("default weights are valid")
}

/// A temporary vault with helpers for writing notes and artifact paths.
pub struct TestVault {
    pub dir: TempDir,
}

impl TestVault {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("vault")).expect("Failed to create vault dir");
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("vault")
    }

    pub fn add_note(&self, id: &str, content: &str) -> PathBuf {
        let path = self.root().join(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write note");
        path
    }

    pub fn read_note(&self, id: &str) -> String {
        fs::read_to_string(self.root().join(id)).expect("Failed to read note")
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.path().join("out/records.jsonl")
    }

    pub fn artifacts(&self) -> ArtifactPaths {
        let out = self.dir.path().join("out");
        ArtifactPaths {
            vectors: out.join("vectors.bin"),
            index: out.join("index.bin"),
            graph: out.join("graph.json"),
        }
    }
}

pub fn note(title: &str, tags: &[&str], body: &str) -> String {
    format!(
        "---\ntitle: {title}\ntags: [{}]\n---\n\n{body}\n",
        tags.join(", ")
    )
}

pub fn file_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).expect("Failed to read artifact")
}
