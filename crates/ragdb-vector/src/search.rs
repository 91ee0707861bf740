use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::VectorIndexer;
use ragdb_core::types::{Document, Record, SearchResult, SourceKind};

use crate::schema::{FILE_NAME, ID, TEXT};
use crate::table::partition_filter;

const ID_FILTER_CHUNK: usize = 256;

/// Vector side of a collection stored in one Lance table.
pub struct LanceVectorIndex { pub(crate) table: Table, pub(crate) name: String, pub(crate) embedding_size: usize }

impl LanceVectorIndex {
	pub fn name(&self) -> &str { &self.name }

	/// Cosine search; scores are `1 - cosine distance`, highest first.
	pub async fn search_vector(&self, query: &[f32], top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
		if query.len() != self.embedding_size {
			return Err(Error::SchemaMismatch { collection: self.name.clone(), expected: self.embedding_size, actual: query.len() });
		}
		let limit = top_k.min(self.count_rows(None).await?);
		if limit == 0 { return Ok(vec![]); }
		let mut q = self.table.vector_search(query.to_vec()).map_err(Error::storage)?.distance_type(DistanceType::Cosine).limit(limit);
		if let Some(f) = file_name { q = q.only_if(partition_filter(f)); }
		let mut stream = q.execute().await.map_err(Error::storage)?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
			let ids = string_column(&batch, ID)?; let texts = string_column(&batch, TEXT)?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| Error::storage("vector search result has no _distance column"))?;
			for i in 0..batch.num_rows() {
				let score = if distances.is_null(i) { 0.0 } else { 1.0 - distances.value(i) };
				hits.push(SearchResult { id: ids.value(i).to_string(), text: texts.value(i).to_string(), score, source: SourceKind::Vector });
			}
		}
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(limit);
		debug!(collection = %self.name, hits = hits.len(), "vector search");
		Ok(hits)
	}

	/// Stored documents in insertion order, optionally for one partition.
	pub async fn documents(&self, file_name: Option<&str>) -> Result<Vec<Document>> {
		let filter = file_name.map(partition_filter);
		let total = self.count_rows(filter.clone()).await?;
		if total == 0 { return Ok(vec![]); }
		let mut q = self.table.query().select(Select::columns(&[ID, TEXT, FILE_NAME])).limit(total);
		if let Some(f) = filter { q = q.only_if(f); }
		let mut stream = q.execute().await.map_err(Error::storage)?;
		let mut docs = Vec::with_capacity(total);
		while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
			let ids = string_column(&batch, ID)?; let texts = string_column(&batch, TEXT)?; let files = string_column(&batch, FILE_NAME)?;
			for i in 0..batch.num_rows() {
				docs.push(Document { id: ids.value(i).to_string(), text: texts.value(i).to_string(), file_name: files.value(i).to_string() });
			}
		}
		Ok(docs)
	}

	pub async fn delete_partition(&self, file_name: &str) -> Result<usize> {
		let filter = partition_filter(file_name);
		let matching = self.count_rows(Some(filter.clone())).await?;
		if matching == 0 { return Ok(0); }
		self.table.delete(&filter).await.map_err(Error::storage)?;
		debug!(collection = %self.name, file_name, deleted = matching, "deleted partition");
		Ok(matching)
	}

	pub async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>> {
		let mut found = Vec::new();
		if self.count_rows(None).await? == 0 { return Ok(found); }
		for chunk in ids.chunks(ID_FILTER_CHUNK) {
			let list = chunk.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>().join(", ");
			let mut stream = self.table.query().select(Select::columns(&[ID])).only_if(format!("{ID} IN ({list})")).limit(chunk.len().max(1))
				.execute().await.map_err(Error::storage)?;
			while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
				let col = string_column(&batch, ID)?;
				found.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
			}
		}
		Ok(found)
	}

	pub(crate) async fn count_rows(&self, filter: Option<String>) -> Result<usize> {
		self.table.count_rows(filter).await.map_err(Error::storage)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::storage(format!("column '{name}' missing or not utf8")))
}

#[async_trait]
impl VectorIndexer for LanceVectorIndex {
	fn embedding_size(&self) -> usize { self.embedding_size }
	async fn insert(&self, records: &[Record]) -> Result<()> { self.add_records(records).await }
	async fn delete_partition(&self, file_name: &str) -> Result<usize> { LanceVectorIndex::delete_partition(self, file_name).await }
	async fn search_vector(&self, query: &[f32], top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
		LanceVectorIndex::search_vector(self, query, top_k, file_name).await
	}
	async fn documents(&self, file_name: Option<&str>) -> Result<Vec<Document>> { LanceVectorIndex::documents(self, file_name).await }
	async fn count(&self, file_name: Option<&str>) -> Result<usize> { self.count_rows(file_name.map(partition_filter)).await }
	async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>> { LanceVectorIndex::existing_ids(self, ids).await }
}
