use ragdb_core::error::Error;
use ragdb_core::traits::VectorIndexer;
use ragdb_core::types::Record;
use ragdb_vector::{drop_table, open_db, table_names, LanceVectorIndex};
use tempfile::TempDir;

fn record(id: &str, vector: Vec<f32>, file_name: &str) -> Record {
    Record { id: id.into(), vector, text: format!("text of {id}"), file_name: file_name.into() }
}

async fn fresh(dim: usize) -> (TempDir, LanceVectorIndex) {
    let tmp = TempDir::new().expect("tmp");
    let conn = open_db(&tmp.path().to_string_lossy()).await.expect("connect");
    let index = LanceVectorIndex::create_or_open(&conn, "p_docs", dim).await.expect("create");
    (tmp, index)
}

#[tokio::test]
async fn identical_vector_scores_one() {
    let (_tmp, index) = fresh(3).await;
    index.insert(&[record("a", vec![1.0, 0.0, 0.0], "f.txt"), record("b", vec![0.0, 1.0, 0.0], "f.txt")]).await.expect("insert");
    let hits = index.search_vector(&[1.0, 0.0, 0.0], 2, None).await.expect("search");
    assert_eq!(hits[0].id, "a");
    assert!((hits[0].score - 1.0).abs() < 1e-4, "score {}", hits[0].score);
    assert_eq!(hits[0].text, "text of a");
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn empty_collection_and_zero_top_k_return_nothing() {
    let (_tmp, index) = fresh(2).await;
    assert!(index.search_vector(&[1.0, 0.0], 5, None).await.expect("search").is_empty());
    index.insert(&[record("a", vec![1.0, 0.0], "f.txt")]).await.expect("insert");
    assert!(index.search_vector(&[1.0, 0.0], 0, None).await.expect("search").is_empty());
}

#[tokio::test]
async fn partitions_are_isolated() {
    let (_tmp, index) = fresh(2).await;
    index
        .insert(&[record("a", vec![1.0, 0.0], "x.txt"), record("b", vec![1.0, 0.1], "y.txt"), record("c", vec![0.9, 0.0], "o'neil.txt")])
        .await
        .expect("insert");
    let hits = index.search_vector(&[1.0, 0.0], 5, Some("y.txt")).await.expect("search");
    assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(index.count(Some("o'neil.txt")).await.expect("count"), 1);

    assert_eq!(index.delete_partition("x.txt").await.expect("delete"), 1);
    assert_eq!(index.delete_partition("x.txt").await.expect("delete again"), 0);
    let ids: Vec<String> = index.documents(None).await.expect("docs").into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["b".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn existing_ids_reports_stored_ids() {
    let (_tmp, index) = fresh(1).await;
    index.insert(&[record("f.txt:0", vec![1.0], "f.txt")]).await.expect("insert");
    let found = index.existing_ids(&["f.txt:0".into(), "f.txt:1".into()]).await.expect("ids");
    assert_eq!(found, vec!["f.txt:0".to_string()]);
}

#[tokio::test]
async fn reopening_with_another_dimension_is_a_schema_mismatch() {
    let tmp = TempDir::new().expect("tmp");
    let conn = open_db(&tmp.path().to_string_lossy()).await.expect("connect");
    LanceVectorIndex::create_or_open(&conn, "p_docs", 4).await.expect("create");
    assert_eq!(table_names(&conn).await.expect("names"), vec!["p_docs".to_string()]);
    match LanceVectorIndex::create_or_open(&conn, "p_docs", 8).await {
        Err(Error::SchemaMismatch { expected, actual, .. }) => assert_eq!((expected, actual), (8, 4)),
        other => panic!("expected schema mismatch, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn query_of_wrong_dimension_is_rejected() {
    let (_tmp, index) = fresh(3).await;
    let err = index.search_vector(&[1.0], 1, None).await.unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }));
}

#[tokio::test]
async fn huge_top_k_returns_every_row() {
    let (_tmp, index) = fresh(2).await;
    index
        .insert(&[record("a", vec![1.0, 0.0], "f.txt"), record("b", vec![0.0, 1.0], "f.txt"), record("c", vec![1.0, 1.0], "g.txt")])
        .await
        .expect("insert");
    let hits = index.search_vector(&[1.0, 0.0], usize::MAX >> 8, None).await.expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "a");
    let filtered = index.search_vector(&[1.0, 0.0], usize::MAX >> 8, Some("f.txt")).await.expect("search");
    assert_eq!(filtered.len(), 2);
}

#[tokio::test]
async fn dropped_table_is_gone_and_can_be_recreated() {
    let tmp = TempDir::new().expect("tmp");
    let conn = open_db(&tmp.path().to_string_lossy()).await.expect("connect");
    let index = LanceVectorIndex::create_or_open(&conn, "p_docs", 2).await.expect("create");
    index.insert(&[record("a", vec![1.0, 0.0], "f.txt")]).await.expect("insert");
    drop(index);

    drop_table(&conn, "p_docs").await.expect("drop");
    assert!(table_names(&conn).await.expect("names").is_empty());
    assert!(!tmp.path().join("p_docs.lance").exists());

    let fresh = LanceVectorIndex::create_or_open(&conn, "p_docs", 4).await.expect("recreate");
    assert_eq!(fresh.count(None).await.expect("count"), 0);
}
