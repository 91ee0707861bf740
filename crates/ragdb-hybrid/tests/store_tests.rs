use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ragdb_core::config::StoreSettings;
use ragdb_core::error::Error;
use ragdb_core::types::{MergePolicy, SearchMode, SearchParams, SearchRequest, SourceKind};
use ragdb_hybrid::Store;
use tempfile::TempDir;

const DIM: usize = 4;

async fn lance_store(dir: &Path) -> Store {
    let settings = StoreSettings { backend: "lancedb".into(), dir: dir.to_string_lossy().to_string(), ..Default::default() };
    Store::from_settings(&settings, dir).await.expect("store")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i % DIM] = 1.0;
    v
}

fn request(mode: SearchMode, text: &str, vector: Vec<f32>, top_k: usize) -> SearchRequest {
    SearchRequest { query_text: text.into(), query_vector: vector, params: SearchParams { mode, top_k, ..Default::default() } }
}

async fn insert_then_search_returns_own_vector(store: Store) {
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    c.insert_batch("f.txt", &strings(&["north", "east"]), &strings(&["1", "2"]), &[axis(0), axis(1)]).await.expect("insert");
    let hits = c.search(&request(SearchMode::Vector, "", axis(1), 2)).await.expect("search");
    assert_eq!(hits[0].id, "2");
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert_eq!(hits[0].source, SourceKind::Vector);
    assert!(hits[1].score.abs() < 1e-4, "orthogonal vector scores 0");
}

async fn cat_and_dog_lexical_scenario(store: Store) {
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    c.insert_batch("f.txt", &strings(&["cat", "dog", "cat and dog"]), &strings(&["1", "2", "3"]), &[axis(0), axis(1), axis(2)])
        .await
        .expect("insert");
    let hits = c.search(&request(SearchMode::Text, "cat", Vec::new(), 2)).await.expect("search");
    let ids: HashSet<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["1", "3"]));
    assert!(hits[0].score >= hits[1].score);
    assert!(hits.iter().all(|h| h.score > 0.0 && h.source == SourceKind::Lexical));
    let sum: f32 = hits.iter().map(|h| h.score).sum();
    assert!((sum - 1.0).abs() < 1e-5);
}

async fn hybrid_respects_proportions(store: Store) {
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    let n = 12;
    let texts: Vec<String> = (0..n).map(|i| format!("alpha entry {i}")).collect();
    let ids: Vec<String> = (0..n).map(|i| format!("f.txt:{i}")).collect();
    let vectors: Vec<Vec<f32>> = (0..n).map(|i| vec![1.0, i as f32 * 0.1, 0.0, 0.0]).collect();
    c.insert_batch("f.txt", &texts, &ids, &vectors).await.expect("insert");

    let mut req = request(SearchMode::Hybrid, "alpha", vec![1.0, 0.0, 0.0, 0.0], 10);
    req.params.hybrid_scale = 0.7;
    let hits = c.search(&req).await.expect("search");
    let vector = hits.iter().filter(|h| h.source == SourceKind::Vector).count();
    let lexical = hits.iter().filter(|h| h.source == SourceKind::Lexical).count();
    assert_eq!((vector, lexical), (7, 3));
    let unique: HashSet<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(unique.len(), hits.len());
    assert!(hits[..7].iter().all(|h| h.source == SourceKind::Vector), "vector slice comes first");

    req.params.merge_policy = MergePolicy::SortByScore;
    let sorted = c.search(&req).await.expect("sorted search");
    assert!(sorted.windows(2).all(|w| w[0].score >= w[1].score));
}

async fn empty_collection_searches_are_empty(store: Store) {
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    for mode in [SearchMode::Vector, SearchMode::Text, SearchMode::Hybrid] {
        assert!(c.search(&request(mode, "anything", axis(0), 5)).await.expect("search").is_empty(), "{mode}");
    }
}

async fn partition_delete_is_isolated(store: Store) {
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    c.insert_batch("a.txt", &strings(&["apple pie", "apple tart"]), &strings(&["a.txt:0", "a.txt:1"]), &[axis(0), axis(1)]).await.expect("insert a");
    c.insert_batch("b.txt", &strings(&["apple juice"]), &strings(&["b.txt:0"]), &[axis(0)]).await.expect("insert b");

    assert_eq!(c.delete_by_partition(None).await.expect("no-op"), 0);
    assert_eq!(c.count(None).await.expect("count"), 3);

    assert_eq!(c.delete_by_partition(Some("a.txt")).await.expect("delete"), 2);
    assert_eq!(c.count(Some("a.txt")).await.expect("count a"), 0);
    assert_eq!(c.count(Some("b.txt")).await.expect("count b"), 1);
    let text_hits = c.search(&request(SearchMode::Text, "apple", Vec::new(), 5)).await.expect("text");
    assert_eq!(text_hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["b.txt:0"]);
    let vector_hits = c.search(&request(SearchMode::Vector, "", axis(0), 5)).await.expect("vector");
    assert_eq!(vector_hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["b.txt:0"]);

    let mut filtered = request(SearchMode::Text, "apple", Vec::new(), 5);
    filtered.params.file_name = Some("a.txt".into());
    assert!(c.search(&filtered).await.expect("filtered").is_empty());
}

async fn schema_is_enforced(store: Store) {
    store.open_or_create("p_docs", 384).await.expect("create");
    match store.open_or_create("p_docs", 512).await {
        Err(Error::SchemaMismatch { expected, actual, .. }) => assert_eq!((expected, actual), (512, 384)),
        other => panic!("expected schema mismatch, got {:?}", other.err()),
    }
}

const BATCHES: usize = 5;
const BATCH_LEN: usize = 3;

/// Searches run while batches are inserted and then deleted in order, so every
/// committed state holds a contiguous run of whole batches.
async fn searches_see_whole_generations(store: Store) {
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let c = Arc::clone(&c);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut snapshots = Vec::new();
            loop {
                let finished = done.load(Ordering::Acquire);
                let hits = c.search(&request(SearchMode::Text, "alpha", Vec::new(), 100)).await.expect("search");
                snapshots.push(hits);
                if finished {
                    break;
                }
                tokio::task::yield_now().await;
            }
            snapshots
        })
    };

    for b in 0..BATCHES {
        let texts: Vec<String> = (0..BATCH_LEN).map(|j| format!("alpha batch {b} row {j}")).collect();
        let ids: Vec<String> = (0..BATCH_LEN).map(|j| format!("b{b}.txt:{j}")).collect();
        let vectors: Vec<Vec<f32>> = (0..BATCH_LEN).map(axis).collect();
        c.insert_batch(&format!("b{b}.txt"), &texts, &ids, &vectors).await.expect("insert");
    }
    for b in 0..BATCHES {
        assert_eq!(c.delete_by_partition(Some(&format!("b{b}.txt"))).await.expect("delete"), BATCH_LEN);
    }
    done.store(true, Ordering::Release);

    let snapshots = reader.await.expect("reader task");
    assert!(!snapshots.is_empty());
    for hits in snapshots {
        if hits.is_empty() {
            continue;
        }
        let sum: f32 = hits.iter().map(|h| h.score).sum();
        assert!((sum - 1.0).abs() < 1e-4, "scores sum to {sum}");

        let mut per_batch: BTreeMap<usize, usize> = BTreeMap::new();
        for h in &hits {
            let batch = h.id.strip_prefix('b').and_then(|rest| rest.split('.').next()).and_then(|n| n.parse().ok()).expect("batch id");
            *per_batch.entry(batch).or_default() += 1;
        }
        assert!(per_batch.values().all(|&n| n == BATCH_LEN), "partial batch visible: {per_batch:?}");
        let batches: Vec<usize> = per_batch.keys().copied().collect();
        assert!(batches.windows(2).all(|w| w[1] == w[0] + 1), "non-contiguous batches: {batches:?}");
    }
}

#[tokio::test]
async fn memory_insert_then_search() { insert_then_search_returns_own_vector(Store::in_memory()).await }

#[tokio::test]
async fn lancedb_insert_then_search() {
    let tmp = TempDir::new().expect("tmp");
    insert_then_search_returns_own_vector(lance_store(tmp.path()).await).await
}

#[tokio::test]
async fn memory_cat_and_dog() { cat_and_dog_lexical_scenario(Store::in_memory()).await }

#[tokio::test]
async fn lancedb_cat_and_dog() {
    let tmp = TempDir::new().expect("tmp");
    cat_and_dog_lexical_scenario(lance_store(tmp.path()).await).await
}

#[tokio::test]
async fn memory_hybrid_proportions() { hybrid_respects_proportions(Store::in_memory()).await }

#[tokio::test]
async fn lancedb_hybrid_proportions() {
    let tmp = TempDir::new().expect("tmp");
    hybrid_respects_proportions(lance_store(tmp.path()).await).await
}

#[tokio::test]
async fn memory_empty_collection() { empty_collection_searches_are_empty(Store::in_memory()).await }

#[tokio::test]
async fn lancedb_empty_collection() {
    let tmp = TempDir::new().expect("tmp");
    empty_collection_searches_are_empty(lance_store(tmp.path()).await).await
}

#[tokio::test]
async fn memory_partition_delete() { partition_delete_is_isolated(Store::in_memory()).await }

#[tokio::test]
async fn lancedb_partition_delete() {
    let tmp = TempDir::new().expect("tmp");
    partition_delete_is_isolated(lance_store(tmp.path()).await).await
}

#[tokio::test]
async fn memory_schema_enforcement() { schema_is_enforced(Store::in_memory()).await }

#[tokio::test]
async fn lancedb_schema_enforcement_survives_restart() {
    let tmp = TempDir::new().expect("tmp");
    lance_store(tmp.path()).await.open_or_create("p_docs", 384).await.expect("create");
    let reopened = lance_store(tmp.path()).await;
    assert!(matches!(reopened.open_or_create("p_docs", 512).await, Err(Error::SchemaMismatch { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn memory_searches_during_mutations() { searches_see_whole_generations(Store::in_memory()).await }

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lancedb_searches_during_mutations() {
    let tmp = TempDir::new().expect("tmp");
    searches_see_whole_generations(lance_store(tmp.path()).await).await
}

#[tokio::test]
async fn open_or_create_returns_the_shared_handle() {
    let store = Store::in_memory();
    let a = store.open_or_create("p_docs", DIM).await.expect("a");
    let b = store.open_or_create("p_docs", DIM).await.expect("b");
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn invalid_batches_write_nothing() {
    let store = Store::in_memory();
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    c.insert_batch("f.txt", &strings(&["one"]), &strings(&["f.txt:0"]), &[axis(0)]).await.expect("insert");

    let shape = c.insert_batch("f.txt", &strings(&["a", "b"]), &strings(&["x"]), &[axis(0), axis(1)]).await;
    assert!(matches!(shape, Err(Error::ShapeMismatch(_))));
    let dim = c.insert_batch("f.txt", &strings(&["a"]), &strings(&["x"]), &[vec![1.0]]).await;
    assert!(matches!(dim, Err(Error::SchemaMismatch { .. })));
    let dup_in_batch = c.insert_batch("f.txt", &strings(&["a", "b"]), &strings(&["x", "x"]), &[axis(0), axis(1)]).await;
    assert!(matches!(dup_in_batch, Err(Error::DuplicateId(id)) if id == "x"));
    let dup_stored = c.insert_batch("f.txt", &strings(&["a", "b"]), &strings(&["y", "f.txt:0"]), &[axis(0), axis(1)]).await;
    assert!(matches!(dup_stored, Err(Error::DuplicateId(id)) if id == "f.txt:0"));

    assert_eq!(c.count(None).await.expect("count"), 1);
    assert_eq!(c.insert_batch("f.txt", &[], &[], &[]).await.expect("empty"), 0);
}

#[tokio::test]
async fn out_of_range_parameters_are_rejected() {
    let store = Store::in_memory();
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    let mut req = request(SearchMode::Hybrid, "q", axis(0), 5);
    req.params.hybrid_scale = 1.5;
    assert!(matches!(c.search(&req).await, Err(Error::InvalidInput(_))));
    let short = request(SearchMode::Hybrid, "q", vec![1.0], 5);
    assert!(matches!(c.search(&short).await, Err(Error::SchemaMismatch { .. })));
    assert!(matches!(store.open_or_create("../escape", DIM).await, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn browse_pages_through_documents() {
    let store = Store::in_memory();
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    let texts: Vec<String> = (0..5).map(|i| format!("doc {i}")).collect();
    let ids: Vec<String> = (0..5).map(|i| format!("f.txt:{i}")).collect();
    c.insert_batch("f.txt", &texts, &ids, &vec![axis(0); 5]).await.expect("insert");

    let first = c.browse(None, 0, 2).await.expect("page 0");
    assert_eq!(first.page, 1);
    assert_eq!((first.total_documents, first.total_pages), (5, 3));
    assert_eq!(first.documents.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["f.txt:0", "f.txt:1"]);
    assert_eq!(c.browse(None, 3, 2).await.expect("last").documents.len(), 1);
    let past = c.browse(None, 9, 2).await.expect("past end");
    assert!(past.documents.is_empty());
    assert_eq!(past.total_pages, 3);
    assert!(c.browse(None, 1, 0).await.is_err());
}

#[tokio::test]
async fn destroyed_collections_are_gone() {
    let tmp = TempDir::new().expect("tmp");
    let store = lance_store(tmp.path()).await;
    let c = store.open_or_create("p_docs", DIM).await.expect("open");
    c.insert_batch("f.txt", &strings(&["text"]), &strings(&["1"]), &[axis(0)]).await.expect("insert");
    assert_eq!(store.list().await.expect("list"), vec!["p_docs".to_string()]);

    store.destroy("p_docs").await.expect("destroy");
    assert!(!store.exists("p_docs").await.expect("exists"));
    assert!(!tmp.path().join("p_docs.lance").exists());
    assert!(!tmp.path().join("p_docs.tantivy").exists());
    assert!(matches!(c.count(None).await, Err(Error::NotFound(_))));
    assert!(matches!(store.destroy("p_docs").await, Err(Error::NotFound(_))));

    let fresh = store.open_or_create("p_docs", DIM).await.expect("recreate");
    assert_eq!(fresh.count(None).await.expect("count"), 0);
}

#[tokio::test]
async fn lancedb_reopen_preserves_records_and_rebuilds_missing_lexical_index() {
    let tmp = TempDir::new().expect("tmp");
    {
        let store = lance_store(tmp.path()).await;
        let c = store.open_or_create("p_docs", DIM).await.expect("open");
        c.insert_batch("f.txt", &strings(&["solar panels", "wind turbine"]), &strings(&["1", "2"]), &[axis(0), axis(1)]).await.expect("insert");
    }
    std::fs::remove_dir_all(tmp.path().join("p_docs.tantivy")).expect("remove lexical index");

    let store = lance_store(tmp.path()).await;
    let c = store.open_or_create("p_docs", DIM).await.expect("reopen");
    assert_eq!(c.count(None).await.expect("count"), 2);
    let hits = c.search(&request(SearchMode::Text, "wind", Vec::new(), 5)).await.expect("search");
    assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["2"]);
}

#[tokio::test]
async fn unknown_backend_is_a_configuration_error() {
    let settings = StoreSettings { backend: "chroma".into(), ..Default::default() };
    assert!(matches!(Store::from_settings(&settings, Path::new(".")).await, Err(Error::Configuration(_))));
}
