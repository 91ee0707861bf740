//! ragdb-core
//!
//! Domain types, error taxonomy, configuration and the traits implemented by
//! the vector, lexical and provider crates.
pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
