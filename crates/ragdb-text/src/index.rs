use std::path::Path;

use tantivy::directory::MmapDirectory;
use tantivy::schema::Field;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use ragdb_core::error::{Error, Result};
use ragdb_core::types::Document;

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// Tantivy index over one collection's `text` field.
///
/// Every rebuild replaces the full document set in a single commit and then
/// reloads the reader, so a concurrent search observes either the previous
/// or the new generation.
pub struct LexicalIndex {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	pub(crate) id_field: Field,
	pub(crate) text_field: Field,
	pub(crate) file_name_field: Field,
}

impl LexicalIndex {
	/// Open the index stored in `index_dir`, creating it if absent.
	pub fn open_or_create(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir)?;
		let directory = MmapDirectory::open(index_dir).map_err(Error::storage)?;
		let index = Index::open_or_create(directory, build_schema()).map_err(Error::storage)?;
		debug!(dir = %index_dir.display(), "opened lexical index");
		Self::from_index(index)
	}

	/// A purely in-memory index.
	pub fn in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let id_field = schema.get_field("id").map_err(Error::storage)?;
		let text_field = schema.get_field("text").map_err(Error::storage)?;
		let file_name_field = schema.get_field("file_name").map_err(Error::storage)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(Error::storage)?;
		Ok(Self { index, reader, id_field, text_field, file_name_field })
	}

	pub fn rebuild(&self, documents: &[Document]) -> Result<()> {
		// One indexing thread keeps documents in insertion order inside a single segment.
		let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_MEMORY_BYTES).map_err(Error::storage)?;
		writer.delete_all_documents().map_err(Error::storage)?;
		for d in documents {
			writer
				.add_document(doc!(
					self.id_field => d.id.clone(),
					self.text_field => d.text.clone(),
					self.file_name_field => d.file_name.clone(),
				))
				.map_err(Error::storage)?;
		}
		writer.commit().map_err(Error::storage)?;
		writer.wait_merging_threads().map_err(Error::storage)?;
		self.reader.reload().map_err(Error::storage)?;
		info!(documents = documents.len(), "rebuilt lexical index");
		Ok(())
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}
}
