//! Extraction and injection against a real directory tree.

use std::sync::Arc;

use crate::common::{TestVault, keyword_composer, note};
use vaultgraph::records::parse_jsonl;
use vaultgraph::{Graph, GraphParams, Injector, JsonlRecordSource, Pipeline, VaultExtractor};

#[test]
fn test_inject_preserves_notes_and_is_idempotent() {
    let vault = TestVault::new();
    vault.add_note(
        "a.md",
        "---\ntitle: Rust memory\ntags: [rust, memory]\nauthor: \"Sam\"\nrelated:\n  - stale.md\n---\n\nRust memory.\n\n## Details\n\nKeep me.\n",
    );
    vault.add_note("b.md", &note("Rust memory", &["rust", "memory"], "Rust memory."));
    vault.add_note("c.md", "Cooking pasta without any header.\n");

    VaultExtractor::new(vault.root())
        .extract_to(&vault.records_path())
        .unwrap();
    let pipeline = Pipeline::new(
        Arc::new(JsonlRecordSource::new(vault.records_path())),
        vault.artifacts(),
    );
    let (graph, _) = pipeline
        .run_all(&keyword_composer(), GraphParams::default())
        .unwrap();

    let injector = Injector::new(vault.root());
    let first = injector.inject_graph(&graph).unwrap();
    assert_eq!(first.updated, 3);

    assert_eq!(
        vault.read_note("a.md"),
        "---\ntitle: Rust memory\ntags: [rust, memory]\nauthor: \"Sam\"\nrelated:\n- b.md\n---\n\nRust memory.\n\n## Details\n\nKeep me.\n"
    );
    assert_eq!(
        vault.read_note("c.md"),
        "---\nrelated: []\n---\nCooking pasta without any header.\n"
    );

    let snapshot: Vec<String> = ["a.md", "b.md", "c.md"]
        .iter()
        .map(|id| vault.read_note(id))
        .collect();
    let second = injector.inject_graph(&graph).unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 3);
    let after: Vec<String> = ["a.md", "b.md", "c.md"]
        .iter()
        .map(|id| vault.read_note(id))
        .collect();
    assert_eq!(snapshot, after);
}

#[test]
fn test_extraction_ignores_injected_links() {
    let vault = TestVault::new();
    vault.add_note("a.md", &note("Garden", &["garden"], "Garden notes."));
    vault.add_note("b.md", &note("Garden", &["garden"], "More garden notes."));

    let extractor = VaultExtractor::new(vault.root());
    let before = extractor.extract().unwrap();

    let pipeline = {
        extractor.extract_to(&vault.records_path()).unwrap();
        Pipeline::new(
            Arc::new(JsonlRecordSource::new(vault.records_path())),
            vault.artifacts(),
        )
    };
    let (graph, _) = pipeline
        .run_all(&keyword_composer(), GraphParams::default())
        .unwrap();
    Injector::new(vault.root()).inject_graph(&graph).unwrap();
    assert!(vault.read_note("a.md").contains("related:\n- b.md\n"));

    let after = extractor.extract().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_extracted_jsonl_reloads() {
    let vault = TestVault::new();
    vault.add_note(
        "deep/nested/n.md",
        "---\ntitle: 42\ntags: solo\n---\nFirst line\nsecond line\n\nNext.\n",
    );
    vault.add_note(".trash/old.md", "ignored");

    let count = VaultExtractor::new(vault.root())
        .extract_to(&vault.records_path())
        .unwrap();
    assert_eq!(count, 1);

    let text = std::fs::read_to_string(vault.records_path()).unwrap();
    let records = parse_jsonl(std::io::Cursor::new(text), "records").unwrap();
    let record = records.get(0).unwrap();
    assert_eq!(record.id, "deep/nested/n.md");
    assert_eq!(record.title, "42");
    assert_eq!(record.tags, vec!["solo"]);
    assert_eq!(record.summary, "First line second line");
}

#[test]
fn test_malformed_front_matter_names_the_note() {
    let vault = TestVault::new();
    vault.add_note("good.md", "Fine.\n");
    vault.add_note("broken.md", "---\ntitle: \"unterminated\n---\nBody\n");

    let err = VaultExtractor::new(vault.root()).extract().unwrap_err();
    assert_eq!(err.status_code(), "DOCUMENT_FORMAT_ERROR");
    assert!(err.to_string().contains("broken.md"), "{err}");
}

#[test]
fn test_inject_reports_missing_note() {
    let vault = TestVault::new();
    vault.add_note("a.md", "Alpha\n");

    let path = vault.dir.path().join("graph.json");
    std::fs::write(
        &path,
        r#"{"a.md":[{"id":"gone.md","score":0.9}],"gone.md":[{"id":"a.md","score":0.9}]}"#,
    )
    .unwrap();
    let source = Graph::load(&path).unwrap();

    let err = Injector::new(vault.root()).inject_graph(&source).unwrap_err();
    assert_eq!(err.status_code(), "ARTIFACT_IO_FAILURE");
    assert!(err.to_string().contains("gone.md"), "{err}");
}

#[test]
fn test_commented_related_block_stays_extractable() {
    let vault = TestVault::new();
    vault.add_note(
        "a.md",
        "---\ntitle: Garden\nrelated:\n# old links\n- old.md\n\n- older.md\ntags: [garden]\n---\nGarden.\n",
    );
    vault.add_note("b.md", &note("Garden", &["garden"], "Garden."));

    let extractor = VaultExtractor::new(vault.root());
    let before = extractor.extract().unwrap();

    let injector = Injector::new(vault.root());
    assert!(injector.inject_note("a.md", &["b.md".to_string()]).unwrap());
    assert_eq!(
        vault.read_note("a.md"),
        "---\ntitle: Garden\ntags: [garden]\nrelated:\n- b.md\n---\nGarden.\n"
    );
    assert_eq!(extractor.extract().unwrap(), before);
}

#[test]
fn test_unrewritable_front_matter_is_left_alone() {
    let vault = TestVault::new();
    let original = "---\nrelated: &links [a.md]\nsee: *links\n---\nBody\n";
    vault.add_note("a.md", original);

    let err = Injector::new(vault.root())
        .inject_note("a.md", &["b.md".to_string()])
        .unwrap_err();
    assert_eq!(err.status_code(), "DOCUMENT_FORMAT_ERROR");
    assert!(err.to_string().contains("a.md"), "{err}");
    assert_eq!(vault.read_note("a.md"), original);
}
