use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const VECTOR: &str = "vector";
pub const TEXT: &str = "text";
pub const FILE_NAME: &str = "file_name";

/// Fixed record schema of a collection; only the vector length varies.
pub fn build_arrow_schema(embedding_size: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID, DataType::Utf8, false),
		Field::new(VECTOR, vector_type(embedding_size), true),
		Field::new(TEXT, DataType::Utf8, false),
		Field::new(FILE_NAME, DataType::Utf8, false),
	]))
}

fn vector_type(embedding_size: usize) -> DataType {
	DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), embedding_size as i32)
}

/// Embedding size recorded in an existing table's schema, if it is a collection table.
pub fn embedding_size_of(schema: &Schema) -> Option<usize> {
	for name in [ID, TEXT, FILE_NAME] {
		if !matches!(schema.field_with_name(name).map(|f| f.data_type()), Ok(DataType::Utf8)) {
			return None;
		}
	}
	match schema.field_with_name(VECTOR).ok()?.data_type() {
		DataType::FixedSizeList(item, size) if item.data_type() == &DataType::Float32 && *size > 0 => Some(*size as usize),
		_ => None,
	}
}
