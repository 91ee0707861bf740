use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::Record;

use crate::schema::build_arrow_schema;
use crate::LanceVectorIndex;

impl LanceVectorIndex {
	pub(crate) async fn add_records(&self, records: &[Record]) -> Result<()> {
		if records.is_empty() { return Ok(()); }
		let record_batch = records_to_record_batch(records, self.embedding_size)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		self.table.add(reader).execute().await.map_err(Error::storage)?;
		debug!(collection = %self.name, records = records.len(), "appended records");
		Ok(())
	}
}

/// Column-wise Arrow batch for `records`. Every vector must have `embedding_size` values.
pub fn records_to_record_batch(records: &[Record], embedding_size: usize) -> Result<RecordBatch> {
	let mut ids = Vec::with_capacity(records.len()); let mut texts = Vec::with_capacity(records.len()); let mut file_names = Vec::with_capacity(records.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
	for r in records {
		if r.vector.len() != embedding_size {
			return Err(Error::ShapeMismatch(format!("record '{}' has {} values, expected {}", r.id, r.vector.len(), embedding_size)));
		}
		ids.push(r.id.clone()); texts.push(r.text.clone()); file_names.push(r.file_name.clone());
		vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(build_arrow_schema(embedding_size), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), embedding_size as i32)),
		Arc::new(StringArray::from(texts)),
		Arc::new(StringArray::from(file_names)),
	]).map_err(Error::storage)?;
	Ok(record_batch)
}
