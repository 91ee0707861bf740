//! ragdb-text
//!
//! Tantivy-based lexical index. `index` owns the schema, on-disk location and
//! full rebuilds; `search` runs BM25 queries and normalises scores within the
//! returned set.
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::LexicalIndex;
pub use search::normalize_in_set;
