use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use ragdb_core::config::{resolve_with_base, StoreSettings};
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Backend;

use crate::backend::{LanceBackend, MemoryBackend};
use crate::collection::Collection;

/// Registry of open collections over one backend.
///
/// `open_or_create` hands out one shared [`Collection`] per name, so the
/// per-collection write lock covers every caller in the process.
pub struct Store {
    backend: Arc<dyn Backend>,
    collections: Mutex<HashMap<String, Arc<Collection>>>,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend, collections: Mutex::new(HashMap::new()) }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Build the backend named by `settings.backend`; relative `dir` values resolve against `base`.
    pub async fn from_settings(settings: &StoreSettings, base: &Path) -> Result<Self> {
        let backend: Arc<dyn Backend> = match settings.backend.as_str() {
            "lancedb" => Arc::new(LanceBackend::open(&resolve_with_base(base, &settings.dir)).await?),
            "memory" => Arc::new(MemoryBackend::new()),
            other => return Err(Error::Configuration(format!("{other} backend is not supported"))),
        };
        Ok(Self::new(backend))
    }

    pub fn backend_kind(&self) -> &'static str { self.backend.kind() }

    pub async fn open_or_create(&self, name: &str, embedding_size: usize) -> Result<Arc<Collection>> {
        let mut collections = self.collections.lock().await;
        if let Some(c) = collections.get(name) {
            if c.embedding_size() != embedding_size {
                return Err(Error::SchemaMismatch { collection: name.to_string(), expected: embedding_size, actual: c.embedding_size() });
            }
            return Ok(Arc::clone(c));
        }
        let indexes = self.backend.create_or_open(name, embedding_size).await?;
        let collection = Arc::new(Collection::new(name, embedding_size, indexes));
        collections.insert(name.to_string(), Arc::clone(&collection));
        info!(collection = name, backend = self.backend.kind(), embedding_size, "collection ready");
        Ok(collection)
    }

    /// Remove the collection and all of its stored state. Outstanding handles fail with `NotFound` afterwards.
    pub async fn destroy(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.lock().await;
        match collections.get(name).cloned() {
            Some(collection) => {
                let _guard = collection.lock_for_write().await;
                self.backend.destroy(name).await?;
                collection.mark_dropped();
                collections.remove(name);
            }
            None => self.backend.destroy(name).await?,
        }
        Ok(())
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.backend.exists(name).await
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.backend.list().await
    }
}
