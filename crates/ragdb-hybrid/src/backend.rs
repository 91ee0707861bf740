//! Storage backends producing the index pair for a collection.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lancedb::Connection;
use tokio::sync::Mutex;
use tracing::{info, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{Backend, CollectionIndexes, TextIndexer, VectorIndexer};
use ragdb_core::types::validate_collection_name;
use ragdb_text::LexicalIndex;
use ragdb_vector::{drop_table, open_db, table_names, FlatVectorIndex, LanceVectorIndex};

/// LanceDB tables plus Tantivy directories under one root:
/// `<dir>/<name>.lance` and `<dir>/<name>.tantivy`.
pub struct LanceBackend {
    dir: PathBuf,
    conn: Connection,
}

impl LanceBackend {
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = open_db(&dir.to_string_lossy()).await?;
        info!(dir = %dir.display(), "opened lancedb store");
        Ok(Self { dir: dir.to_path_buf(), conn })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    fn lexical_dir(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.tantivy"))
    }
}

/// Rebuild `text` from the stored records when its document count drifted.
async fn reconcile_lexical(name: &str, vector: &dyn VectorIndexer, text: Arc<LexicalIndex>) -> Result<()> {
    let stored = vector.count(None).await?;
    let indexed = text.num_docs();
    if indexed == stored as u64 {
        return Ok(());
    }
    warn!(collection = name, stored, indexed, "lexical index out of date, rebuilding");
    let documents = vector.documents(None).await?;
    tokio::task::spawn_blocking(move || text.rebuild(&documents)).await.map_err(Error::storage)?
}

#[async_trait]
impl Backend for LanceBackend {
    fn kind(&self) -> &'static str { "lancedb" }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(table_names(&self.conn).await?.iter().any(|n| n == name))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = table_names(&self.conn).await?;
        names.sort();
        Ok(names)
    }

    async fn create_or_open(&self, name: &str, embedding_size: usize) -> Result<CollectionIndexes> {
        validate_collection_name(name)?;
        let vector = LanceVectorIndex::create_or_open(&self.conn, name, embedding_size).await?;
        let lexical_dir = self.lexical_dir(name);
        let text = tokio::task::spawn_blocking(move || LexicalIndex::open_or_create(&lexical_dir))
            .await
            .map_err(Error::storage)??;
        let text = Arc::new(text);
        reconcile_lexical(name, &vector, Arc::clone(&text)).await?;
        Ok(CollectionIndexes { vector: Arc::new(vector), text })
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            return Err(Error::NotFound(format!("collection '{name}'")));
        }
        drop_table(&self.conn, name).await?;
        let lexical_dir = self.lexical_dir(name);
        if lexical_dir.exists() {
            std::fs::remove_dir_all(&lexical_dir)?;
        }
        info!(collection = name, "destroyed collection");
        Ok(())
    }
}

struct MemoryCollection {
    embedding_size: usize,
    indexes: CollectionIndexes,
}

/// Everything in process memory; nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    collections: Mutex<HashMap<String, MemoryCollection>>,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> &'static str { "memory" }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.lock().await.contains_key(name))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.lock().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_or_open(&self, name: &str, embedding_size: usize) -> Result<CollectionIndexes> {
        validate_collection_name(name)?;
        let mut collections = self.collections.lock().await;
        if let Some(c) = collections.get(name) {
            if c.embedding_size != embedding_size {
                return Err(Error::SchemaMismatch { collection: name.to_string(), expected: embedding_size, actual: c.embedding_size });
            }
            return Ok(c.indexes.clone());
        }
        let vector: Arc<dyn VectorIndexer> = Arc::new(FlatVectorIndex::new(name, embedding_size));
        let text: Arc<dyn TextIndexer> = Arc::new(LexicalIndex::in_ram()?);
        let indexes = CollectionIndexes { vector, text };
        collections.insert(name.to_string(), MemoryCollection { embedding_size, indexes: indexes.clone() });
        Ok(indexes)
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        self.collections
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("collection '{name}'")))
    }
}
