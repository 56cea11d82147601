//! Property tests for the index and the graph builder against a brute-force model.

use proptest::prelude::*;
use vaultgraph::vector::{FlatIpIndex, VectorMatrix, dot, l2_normalize};
use vaultgraph::{DocumentRecord, GraphBuilder, GraphParams, RecordSet};

fn corpus() -> impl Strategy<Value = (usize, Vec<Vec<f32>>)> {
    (1usize..6).prop_flat_map(|dim| {
        (
            Just(dim),
            prop::collection::vec(prop::collection::vec(-1.0f32..1.0, dim), 2..14),
        )
    })
}

fn records(n: usize) -> RecordSet {
    RecordSet::new(
        (0..n)
            .map(|i| DocumentRecord::new(format!("note-{i:02}.md"), "", "", Vec::new()))
            .collect(),
        "proptest",
    )
    .unwrap()
}

/// Every other document above the threshold, best first, ties by position.
fn brute_force(rows: &[Vec<f32>], i: usize, k: usize, threshold: f32) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = rows
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(j, row)| (j, dot(&rows[i], row)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .filter(|(_, score)| *score >= threshold)
        .take(k)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn graph_matches_brute_force(
        (_dim, rows) in corpus(),
        k in 1usize..6,
        threshold in -1.0f32..1.0,
    ) {
        let n = rows.len();
        let matrix = VectorMatrix::from_rows(rows.clone()).unwrap();
        let index = FlatIpIndex::build(&matrix).unwrap();
        let records = records(n);

        let graph = GraphBuilder::new(GraphParams { k, threshold })
            .unwrap()
            .build(&records, &matrix, &index)
            .unwrap();

        let ids: Vec<&str> = graph.ids().collect();
        let expected_ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        prop_assert_eq!(ids, expected_ids);

        for (i, record) in records.iter().enumerate() {
            let edges = graph.neighbors(&record.id).unwrap();
            prop_assert!(edges.len() <= k);
            prop_assert!(edges.iter().all(|e| e.id != record.id));
            prop_assert!(edges.iter().all(|e| e.score >= threshold));
            prop_assert!(edges.windows(2).all(|w| w[0].score >= w[1].score));

            let expected: Vec<(String, f32)> = brute_force(&rows, i, k, threshold)
                .into_iter()
                .map(|(j, score)| (records.get(j).unwrap().id.clone(), score))
                .collect();
            let actual: Vec<(String, f32)> =
                edges.iter().map(|e| (e.id.clone(), e.score)).collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn complete_graph_without_threshold(
        (_dim, rows) in corpus(),
    ) {
        let n = rows.len();
        let matrix = VectorMatrix::from_rows(rows).unwrap();
        let index = FlatIpIndex::build(&matrix).unwrap();

        let graph = GraphBuilder::new(GraphParams { k: n - 1, threshold: f32::NEG_INFINITY })
            .unwrap()
            .build(&records(n), &matrix, &index)
            .unwrap();

        for (_, edges) in &graph {
            prop_assert_eq!(edges.len(), n - 1);
        }
        prop_assert_eq!(graph.edge_count(), n * (n - 1));
    }

    #[test]
    fn unit_vectors_find_themselves_first(
        (_dim, rows) in corpus(),
    ) {
        let rows: Vec<Vec<f32>> = rows
            .into_iter()
            .map(|mut row| {
                // Keep clear of zero-norm rows, which cannot be normalized
                row[0] += 2.0;
                l2_normalize(&mut row);
                row
            })
            .collect();
        let matrix = VectorMatrix::from_rows(rows.clone()).unwrap();
        let index = FlatIpIndex::build(&matrix).unwrap();

        let results = index.search(&matrix, 1).unwrap();
        for (i, hits) in results.iter().enumerate() {
            let self_score = dot(&rows[i], &rows[i]);
            prop_assert!((self_score - 1.0).abs() < 1e-4);
            prop_assert!((hits[0].score - self_score).abs() < 1e-5);
        }
    }
}
