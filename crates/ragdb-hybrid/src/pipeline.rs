//! Ingestion and query flows on top of a collection and a provider.
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use ragdb_core::data_processor::{DataProcessor, DocumentChunk};
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::LlmProvider;
use ragdb_core::types::{SearchMode, SearchParams, SearchRequest, SearchResult};

use crate::collection::Collection;

const ANSWER_SYSTEM_PROMPT: &str =
    "Answer the question using only the numbered context passages. If the context does not contain the answer, say so.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

pub struct Pipeline {
    collection: Arc<Collection>,
    provider: Arc<dyn LlmProvider>,
    batch_size: usize,
}

impl Pipeline {
    pub fn new(collection: Arc<Collection>, provider: Arc<dyn LlmProvider>, batch_size: usize) -> Result<Self> {
        if provider.dim() != collection.embedding_size() {
            return Err(Error::SchemaMismatch {
                collection: collection.name().to_string(),
                expected: collection.embedding_size(),
                actual: provider.dim(),
            });
        }
        Ok(Self { collection, provider, batch_size: batch_size.max(1) })
    }

    pub fn collection(&self) -> &Arc<Collection> { &self.collection }

    /// Load, chunk and ingest one file. Returns the number of records inserted.
    pub async fn ingest_file(&self, processor: &DataProcessor, path: &Path) -> Result<usize> {
        let chunks = processor.process_file(path)?;
        self.ingest_chunks(&chunks, |_| {}).await
    }

    /// Embed and insert `chunks` batch by batch, grouped by partition.
    ///
    /// A failed batch stops ingestion; batches inserted before it stay committed.
    /// `on_batch` is called with the size of each committed batch.
    pub async fn ingest_chunks(&self, chunks: &[DocumentChunk], mut on_batch: impl FnMut(usize)) -> Result<usize> {
        let mut inserted = 0;
        for partition in chunks.chunk_by(|a, b| a.file_name == b.file_name) {
            for batch in partition.chunks(self.batch_size) {
                let n = self.ingest_batch(batch).await?;
                inserted += n;
                on_batch(n);
            }
        }
        info!(collection = %self.collection.name(), chunks = chunks.len(), inserted, "ingested chunks");
        Ok(inserted)
    }

    /// Chunks in one batch must share a `file_name`.
    pub async fn ingest_batch(&self, batch: &[DocumentChunk]) -> Result<usize> {
        let Some(first) = batch.first() else {
            return Ok(0);
        };
        if let Some(other) = batch.iter().find(|c| c.file_name != first.file_name) {
            return Err(Error::InvalidInput(format!(
                "batch mixes partitions '{}' and '{}'",
                first.file_name, other.file_name
            )));
        }
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let ids: Vec<String> = batch.iter().map(DocumentChunk::id).collect();
        let vectors = self.provider.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::ShapeMismatch(format!("provider returned {} vectors for {} texts", vectors.len(), texts.len())));
        }
        debug!(file_name = %first.file_name, batch = texts.len(), "embedded batch");
        self.collection.insert_batch(&first.file_name, &texts, &ids, &vectors).await
    }

    /// Embed `query_text` (unless the mode is pure text) and search.
    pub async fn query(&self, query_text: &str, params: SearchParams) -> Result<Vec<SearchResult>> {
        params.validate()?;
        let query_vector = match params.mode {
            SearchMode::Text => Vec::new(),
            SearchMode::Vector | SearchMode::Hybrid => self
                .provider
                .embed(&[query_text.to_string()])
                .await?
                .pop()
                .ok_or_else(|| Error::ShapeMismatch("provider returned no vector for the query".into()))?,
        };
        let request = SearchRequest { query_text: query_text.to_string(), query_vector, params };
        self.collection.search(&request).await
    }

    /// Retrieve context for `question` and ask the provider's completion model.
    pub async fn answer(&self, question: &str, params: SearchParams) -> Result<Answer> {
        let sources = self.query(question, params).await?;
        let prompt = build_prompt(question, &sources);
        let answer = self.provider.complete(ANSWER_SYSTEM_PROMPT, &prompt).await?;
        Ok(Answer { answer, sources })
    }
}

pub fn build_prompt(question: &str, sources: &[SearchResult]) -> String {
    let mut prompt = String::from("Context:\n");
    for (i, s) in sources.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, s.text));
    }
    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt
}
