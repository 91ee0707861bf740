use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Document, Record, SearchResult};

/// Embedding and completion collaborator.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `fake:hash-384`).
    fn model_id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Text completion for a system + user prompt.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Record storage plus nearest-neighbour search.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    fn embedding_size(&self) -> usize;
    async fn insert(&self, records: &[Record]) -> Result<()>;
    async fn delete_partition(&self, file_name: &str) -> Result<usize>;
    async fn search_vector(&self, query: &[f32], top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>>;
    async fn documents(&self, file_name: Option<&str>) -> Result<Vec<Document>>;
    async fn count(&self, file_name: Option<&str>) -> Result<usize>;
    /// Ids from `ids` that are already stored.
    async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>>;
}

/// Full-text index over the `text` field.
pub trait TextIndexer: Send + Sync {
    /// Replace the whole index with `documents`. Readers see the old or the new index, never a mix.
    fn rebuild(&self, documents: &[Document]) -> Result<()>;
    fn search_text(&self, query: &str, top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>>;
    fn num_docs(&self) -> u64;
}

/// The two indexes backing one collection.
#[derive(Clone)]
pub struct CollectionIndexes {
    pub vector: Arc<dyn VectorIndexer>,
    pub text: Arc<dyn TextIndexer>,
}

/// A storage backend able to create, open and destroy collections.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> &'static str;
    async fn exists(&self, name: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<String>>;
    async fn create_or_open(&self, name: &str, embedding_size: usize) -> Result<CollectionIndexes>;
    async fn destroy(&self, name: &str) -> Result<()>;
}
