//! Hybrid retrieval store: collections over a vector index and a lexical
//! index, merged per query, plus the ingestion and query pipeline.
pub mod backend;
pub mod collection;
pub mod merge;
pub mod pipeline;
pub mod store;

pub use backend::{LanceBackend, MemoryBackend};
pub use collection::Collection;
pub use merge::{merge_hybrid, split_limits};
pub use pipeline::{build_prompt, Answer, Pipeline};
pub use store::Store;
