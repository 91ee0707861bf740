//! Brute-force cosine index held entirely in memory.
use async_trait::async_trait;
use tokio::sync::RwLock;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::VectorIndexer;
use ragdb_core::types::{Document, Record, SearchResult, SourceKind};

pub struct FlatVectorIndex {
	name: String,
	embedding_size: usize,
	records: RwLock<Vec<Record>>,
}

impl FlatVectorIndex {
	pub fn new(name: &str, embedding_size: usize) -> Self {
		Self { name: name.to_string(), embedding_size, records: RwLock::new(Vec::new()) }
	}
}

/// Cosine similarity; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
	for (x, y) in a.iter().zip(b) { dot += x * y; na += x * x; nb += y * y; }
	if na == 0.0 || nb == 0.0 { return 0.0; }
	dot / (na.sqrt() * nb.sqrt())
}

fn in_partition(r: &Record, file_name: Option<&str>) -> bool {
	file_name.is_none_or(|f| r.file_name == f)
}

#[async_trait]
impl VectorIndexer for FlatVectorIndex {
	fn embedding_size(&self) -> usize { self.embedding_size }

	async fn insert(&self, records: &[Record]) -> Result<()> {
		if let Some(r) = records.iter().find(|r| r.vector.len() != self.embedding_size) {
			return Err(Error::ShapeMismatch(format!("record '{}' has {} values, expected {}", r.id, r.vector.len(), self.embedding_size)));
		}
		self.records.write().await.extend_from_slice(records);
		Ok(())
	}

	async fn delete_partition(&self, file_name: &str) -> Result<usize> {
		let mut records = self.records.write().await;
		let before = records.len();
		records.retain(|r| r.file_name != file_name);
		Ok(before - records.len())
	}

	async fn search_vector(&self, query: &[f32], top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
		if query.len() != self.embedding_size {
			return Err(Error::SchemaMismatch { collection: self.name.clone(), expected: self.embedding_size, actual: query.len() });
		}
		let records = self.records.read().await;
		let mut hits: Vec<SearchResult> = records
			.iter()
			.filter(|r| in_partition(r, file_name))
			.map(|r| SearchResult { id: r.id.clone(), text: r.text.clone(), score: cosine_similarity(query, &r.vector), source: SourceKind::Vector })
			.collect();
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(top_k);
		Ok(hits)
	}

	async fn documents(&self, file_name: Option<&str>) -> Result<Vec<Document>> {
		Ok(self.records.read().await.iter().filter(|r| in_partition(r, file_name)).map(Record::document).collect())
	}

	async fn count(&self, file_name: Option<&str>) -> Result<usize> {
		Ok(self.records.read().await.iter().filter(|r| in_partition(r, file_name)).count())
	}

	async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>> {
		let records = self.records.read().await;
		Ok(ids.iter().filter(|id| records.iter().any(|r| &r.id == *id)).cloned().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(id: &str, vector: Vec<f32>, file_name: &str) -> Record {
		Record { id: id.into(), vector, text: format!("text {id}"), file_name: file_name.into() }
	}

	#[test]
	fn cosine_of_zero_vector_is_zero() {
		assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
		assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
	}

	#[tokio::test]
	async fn search_ranks_by_cosine_within_partition() {
		let index = FlatVectorIndex::new("c", 2);
		index.insert(&[record("a", vec![1.0, 0.0], "x"), record("b", vec![0.0, 1.0], "x"), record("c", vec![1.0, 0.1], "y")]).await.unwrap();
		let hits = index.search_vector(&[1.0, 0.0], 5, Some("x")).await.unwrap();
		assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
		assert!((hits[0].score - 1.0).abs() < 1e-6);
	}

	#[tokio::test]
	async fn delete_partition_reports_removed_rows() {
		let index = FlatVectorIndex::new("c", 1);
		index.insert(&[record("a", vec![1.0], "x"), record("b", vec![1.0], "y")]).await.unwrap();
		assert_eq!(index.delete_partition("x").await.unwrap(), 1);
		assert_eq!(index.count(None).await.unwrap(), 1);
		assert_eq!(index.existing_ids(&["a".into(), "b".into()]).await.unwrap(), vec!["b".to_string()]);
	}
}
