//! Vault → records → vectors → index → graph, with a deterministic embedder.

use std::fs;
use std::sync::Arc;

use crate::common::{
    FailingEmbedder, KeywordEmbedder, TestVault, VOCABULARY, file_bytes, keyword_composer, note,
};
use vaultgraph::{
    EmbeddingComposer, FieldWeights, Graph, GraphParams, JsonlRecordSource, Pipeline,
    VaultExtractor,
};

fn sample_vault() -> TestVault {
    let vault = TestVault::new();
    vault.add_note(
        "rust-a.md",
        &note("Rust memory", &["rust", "memory"], "Rust memory ownership."),
    );
    vault.add_note(
        "rust-b.md",
        &note("Rust memory", &["rust", "memory"], "Rust memory ownership."),
    );
    vault.add_note("rust-c.md", &note("Rust", &["rust"], "Rust."));
    vault.add_note(
        "cooking.md",
        &note("Pasta cooking", &["cooking", "pasta"], "Cooking pasta at home."),
    );
    vault.add_note("garden.md", &note("Garden", &["garden"], "Garden notes."));
    vault.add_note("notes/python.md", &note("Python", &["python"], "Python scripts."));
    vault
}

fn pipeline(vault: &TestVault) -> Pipeline {
    let extractor = VaultExtractor::new(vault.root());
    extractor.extract_to(&vault.records_path()).unwrap();
    Pipeline::new(
        Arc::new(JsonlRecordSource::new(vault.records_path())),
        vault.artifacts(),
    )
}

fn assert_edges(graph: &Graph, id: &str, expected: &[(&str, f32)]) {
    let edges = graph.neighbors(id).unwrap_or_else(|| panic!("{id} missing"));
    assert_eq!(edges.len(), expected.len(), "{id}: {edges:?}");
    for (edge, (expected_id, expected_score)) in edges.iter().zip(expected) {
        assert_eq!(edge.id, *expected_id, "{id}: {edges:?}");
        assert!(
            (edge.score - expected_score).abs() < 1e-4,
            "{id} -> {}: {} != {expected_score}",
            edge.id,
            edge.score
        );
    }
}

// rust-a/rust-b vector: (0.4/sqrt2 + 0.1/sqrt2 + 0.5/2) * (e_rust + e_memory)
const PAIR: f32 = 0.728_553;
// rust-c vector is exactly e_rust
const CROSS: f32 = 0.603_553;

#[test]
fn test_vault_to_graph_end_to_end() {
    let vault = sample_vault();
    let pipeline = pipeline(&vault);

    let (graph, stats) = pipeline
        .run_all(&keyword_composer(), GraphParams::default())
        .unwrap();

    assert_eq!(stats.documents, 6);
    assert_eq!(stats.dimension, VOCABULARY.len());
    assert_eq!(
        graph.ids().collect::<Vec<_>>(),
        vec![
            "cooking.md",
            "garden.md",
            "notes/python.md",
            "rust-a.md",
            "rust-b.md",
            "rust-c.md"
        ]
    );

    assert_edges(&graph, "rust-a.md", &[("rust-b.md", PAIR), ("rust-c.md", CROSS)]);
    assert_edges(&graph, "rust-b.md", &[("rust-a.md", PAIR), ("rust-c.md", CROSS)]);
    assert_edges(&graph, "rust-c.md", &[("rust-a.md", CROSS), ("rust-b.md", CROSS)]);
    assert_edges(&graph, "cooking.md", &[]);
    assert_edges(&graph, "garden.md", &[]);
    assert_edges(&graph, "notes/python.md", &[]);

    assert_eq!(Graph::load(&vault.artifacts().graph).unwrap(), graph);
}

#[test]
fn test_k_one_breaks_ties_by_record_order() {
    let vault = sample_vault();
    let (graph, _) = pipeline(&vault)
        .run_all(
            &keyword_composer(),
            GraphParams {
                k: 1,
                threshold: 0.4,
            },
        )
        .unwrap();

    assert_edges(&graph, "rust-a.md", &[("rust-b.md", PAIR)]);
    assert_edges(&graph, "rust-c.md", &[("rust-a.md", CROSS)]);
}

#[test]
fn test_unbounded_threshold_links_everyone() {
    let vault = sample_vault();
    let (graph, _) = pipeline(&vault)
        .run_all(
            &keyword_composer(),
            GraphParams {
                k: 10,
                threshold: f32::NEG_INFINITY,
            },
        )
        .unwrap();

    for (id, edges) in &graph {
        assert_eq!(edges.len(), 5, "{id}");
        assert!(edges.iter().all(|e| e.id != *id));
    }
}

#[test]
fn test_rerun_is_byte_identical() {
    let vault = sample_vault();
    let pipeline = pipeline(&vault);
    let paths = vault.artifacts();

    pipeline
        .run_all(&keyword_composer(), GraphParams::default())
        .unwrap();
    let first = (
        file_bytes(&paths.vectors),
        file_bytes(&paths.index),
        file_bytes(&paths.graph),
    );

    pipeline
        .run_all(&keyword_composer(), GraphParams::default())
        .unwrap();
    let second = (
        file_bytes(&paths.vectors),
        file_bytes(&paths.index),
        file_bytes(&paths.graph),
    );

    assert!(first == second, "artifacts changed between identical runs");
}

#[test]
fn test_failed_embedding_keeps_previous_artifact() {
    let vault = sample_vault();
    let pipeline = pipeline(&vault);
    pipeline.run_embedding(&keyword_composer()).unwrap();
    let before = file_bytes(&vault.artifacts().vectors);

    let failing = EmbeddingComposer::new(
        Arc::new(FailingEmbedder {
            inner: KeywordEmbedder::new(VOCABULARY),
            poison: "Garden",
        }),
        FieldWeights::default(),
    )
    .unwrap();
    let err = pipeline.run_embedding(&failing).unwrap_err();

    assert_eq!(err.status_code(), "EMBEDDING_FAILURE");
    assert!(err.to_string().contains("garden.md"), "{err}");
    assert_eq!(file_bytes(&vault.artifacts().vectors), before);
}

#[test]
fn test_stale_index_is_reported() {
    let vault = sample_vault();
    let pipeline = pipeline(&vault);
    pipeline.run_embedding(&keyword_composer()).unwrap();
    pipeline.run_indexing().unwrap();

    // Re-embed with different weights but keep the old index
    let reweighted = EmbeddingComposer::new(
        Arc::new(KeywordEmbedder::new(VOCABULARY)),
        FieldWeights {
            title: 1.0,
            summary: 0.0,
            tags: 0.0,
        },
    )
    .unwrap();
    pipeline.run_embedding(&reweighted).unwrap();

    let err = pipeline.run_graph(GraphParams::default()).unwrap_err();
    assert_eq!(err.status_code(), "INDEX_QUERY_FAILURE");
    assert!(!vault.artifacts().graph.exists());
}

#[test]
fn test_duplicate_ids_rejected_before_embedding() {
    let vault = TestVault::new();
    let records = vault.records_path();
    fs::create_dir_all(records.parent().unwrap()).unwrap();
    fs::write(
        &records,
        concat!(
            r#"{"id":"a.md","title":"Rust","summary":"","tags":[]}"#,
            "\n",
            r#"{"id":"b.md","title":"Python","summary":"","tags":[]}"#,
            "\n",
            r#"{"id":"a.md","title":"Again","summary":"","tags":[]}"#,
            "\n"
        ),
    )
    .unwrap();

    let pipeline = Pipeline::new(Arc::new(JsonlRecordSource::new(&records)), vault.artifacts());
    let err = pipeline.run_embedding(&keyword_composer()).unwrap_err();

    assert_eq!(err.status_code(), "INPUT_VALIDATION_ERROR");
    let message = err.to_string();
    assert!(message.contains("'a.md'"), "{message}");
    assert!(message.contains("lines 1 and 3"), "{message}");
    assert!(!vault.artifacts().vectors.exists());
}
