use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::CollectionIndexes;
use ragdb_core::types::{Page, Record, SearchMode, SearchRequest, SearchResult};

use crate::merge::merge_hybrid;

/// Handle to one open collection.
///
/// Mutations are serialised by a per-collection lock and each ends with a
/// full lexical rebuild. Searches take no lock. Once the collection is
/// destroyed every call fails with `NotFound`.
pub struct Collection {
    name: String,
    embedding_size: usize,
    indexes: CollectionIndexes,
    write_lock: Mutex<()>,
    dropped: AtomicBool,
}

impl Collection {
    pub(crate) fn new(name: &str, embedding_size: usize, indexes: CollectionIndexes) -> Self {
        Self { name: name.to_string(), embedding_size, indexes, write_lock: Mutex::new(()), dropped: AtomicBool::new(false) }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn embedding_size(&self) -> usize { self.embedding_size }

    fn ensure_live(&self) -> Result<()> {
        if self.dropped.load(Ordering::Acquire) {
            return Err(Error::NotFound(format!("collection '{}' was destroyed", self.name)));
        }
        Ok(())
    }

    pub(crate) async fn lock_for_write(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Release);
    }

    /// Append one partition's records. Everything is validated before any write;
    /// an empty batch is a no-op.
    pub async fn insert_batch(&self, file_name: &str, texts: &[String], ids: &[String], vectors: &[Vec<f32>]) -> Result<usize> {
        if texts.len() != ids.len() || texts.len() != vectors.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} texts, {} ids and {} vectors",
                texts.len(),
                ids.len(),
                vectors.len()
            )));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.embedding_size) {
            return Err(Error::SchemaMismatch { collection: self.name.clone(), expected: self.embedding_size, actual: v.len() });
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(Error::DuplicateId(dup.clone()));
        }
        if texts.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock_for_write().await;
        self.ensure_live()?;
        if let Some(dup) = self.indexes.vector.existing_ids(ids).await?.into_iter().next() {
            return Err(Error::DuplicateId(dup));
        }

        let records: Vec<Record> = texts
            .iter()
            .zip(ids)
            .zip(vectors)
            .map(|((text, id), vector)| Record { id: id.clone(), vector: vector.clone(), text: text.clone(), file_name: file_name.to_string() })
            .collect();
        self.indexes.vector.insert(&records).await?;
        self.rebuild_lexical().await?;
        info!(collection = %self.name, file_name, inserted = records.len(), "inserted batch");
        Ok(records.len())
    }

    /// Remove every record of `file_name`. `None` deletes nothing.
    pub async fn delete_by_partition(&self, file_name: Option<&str>) -> Result<usize> {
        let Some(file_name) = file_name else {
            return Ok(0);
        };
        let _guard = self.lock_for_write().await;
        self.ensure_live()?;
        let removed = self.indexes.vector.delete_partition(file_name).await?;
        if removed > 0 {
            self.rebuild_lexical().await?;
        }
        info!(collection = %self.name, file_name, removed, "deleted partition");
        Ok(removed)
    }

    async fn rebuild_lexical(&self) -> Result<()> {
        let documents = self.indexes.vector.documents(None).await?;
        let text = Arc::clone(&self.indexes.text);
        tokio::task::spawn_blocking(move || text.rebuild(&documents)).await.map_err(Error::storage)?
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.ensure_live()?;
        let params = &request.params;
        params.validate()?;
        let file_name = params.file_name.as_deref();
        let results = match params.mode {
            SearchMode::Vector => self.search_vector(&request.query_vector, params.top_k, file_name).await?,
            SearchMode::Text => self.search_text(&request.query_text, params.top_k, file_name).await?,
            SearchMode::Hybrid => {
                self.check_query_vector(&request.query_vector)?;
                let (vector_hits, lexical_hits) = futures::try_join!(
                    self.search_vector(&request.query_vector, params.top_k, file_name),
                    self.search_text(&request.query_text, params.top_k, file_name),
                )?;
                merge_hybrid(vector_hits, lexical_hits, params.top_k, params.hybrid_scale, params.merge_policy)
            }
        };
        debug!(collection = %self.name, mode = %params.mode, results = results.len(), "search");
        Ok(results)
    }

    pub async fn search_vector(&self, query_vector: &[f32], top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
        self.ensure_live()?;
        self.check_query_vector(query_vector)?;
        self.indexes.vector.search_vector(query_vector, top_k, file_name).await
    }

    pub async fn search_text(&self, query_text: &str, top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
        self.ensure_live()?;
        let text = Arc::clone(&self.indexes.text);
        let query_text = query_text.to_string();
        let file_name = file_name.map(str::to_string);
        tokio::task::spawn_blocking(move || text.search_text(&query_text, top_k, file_name.as_deref()))
            .await
            .map_err(Error::storage)?
    }

    fn check_query_vector(&self, query_vector: &[f32]) -> Result<()> {
        if query_vector.len() != self.embedding_size {
            return Err(Error::SchemaMismatch { collection: self.name.clone(), expected: self.embedding_size, actual: query_vector.len() });
        }
        Ok(())
    }

    pub async fn count(&self, file_name: Option<&str>) -> Result<usize> {
        self.ensure_live()?;
        self.indexes.vector.count(file_name).await
    }

    /// One page of stored documents in insertion order. `page` is 1-based and clamped to at least 1.
    pub async fn browse(&self, file_name: Option<&str>, page: usize, limit: usize) -> Result<Page> {
        self.ensure_live()?;
        if limit == 0 {
            return Err(Error::InvalidInput("page limit must be positive".into()));
        }
        let page = page.max(1);
        let documents = self.indexes.vector.documents(file_name).await?;
        let total_documents = documents.len();
        let total_pages = total_documents.div_ceil(limit);
        let documents = documents.into_iter().skip((page - 1).saturating_mul(limit)).take(limit).collect();
        Ok(Page { documents, total_documents, total_pages, page })
    }
}
