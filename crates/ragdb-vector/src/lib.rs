//! Vector storage for collections: a LanceDB-backed table adapter and an
//! in-memory flat index, both behind `VectorIndexer`.
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::{cosine_similarity, FlatVectorIndex};
pub use search::LanceVectorIndex;
pub use table::{drop_table, open_db, partition_filter, table_names};
