//! Domain types shared by the vector and lexical engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type RecordId = String;

/// One chunk's persisted form.
///
/// - `id`: unique key within the collection
/// - `vector`: embedding, length fixed by the collection
/// - `text`: the chunk payload, indexed for full-text search
/// - `file_name`: partition key used for filtering and deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub vector: Vec<f32>,
    pub text: String,
    pub file_name: String,
}

impl Record {
    pub fn document(&self) -> Document {
        Document { id: self.id.clone(), text: self.text.clone(), file_name: self.file_name.clone() }
    }
}

/// A record without its vector. This is what the lexical index and browsing see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub text: String,
    pub file_name: String,
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Lexical,
}

/// The surface returned by all engines.
///
/// Vector scores are cosine similarities. Lexical scores are normalised within
/// the returned set. The two are not on the same scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: RecordId,
    pub text: String,
    pub score: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Text,
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vector" => Ok(SearchMode::Vector),
            "text" => Ok(SearchMode::Text),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::InvalidInput(format!("unknown search mode '{other}'"))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Vector => "vector",
            SearchMode::Text => "text",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// How the two halves of a hybrid answer are combined.
///
/// `Concatenate` keeps vector hits first and lexical hits after, each in its
/// own rank order. `SortByScore` sorts that concatenation by raw score, which
/// mixes cosine similarities with in-set normalised relevance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    #[default]
    Concatenate,
    SortByScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub mode: SearchMode,
    pub top_k: usize,
    pub hybrid_scale: f32,
    pub file_name: Option<String>,
    pub merge_policy: MergePolicy,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            top_k: 5,
            hybrid_scale: 0.7,
            file_name: None,
            merge_policy: MergePolicy::Concatenate,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if !self.hybrid_scale.is_finite() || !(0.0..=1.0).contains(&self.hybrid_scale) {
            return Err(Error::InvalidInput(format!(
                "hybrid_scale must be within [0, 1], got {}",
                self.hybrid_scale
            )));
        }
        Ok(())
    }
}

/// A fully embedded query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query_text: String,
    pub query_vector: Vec<f32>,
    pub params: SearchParams,
}

/// One page of stored documents, as returned by browsing a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub documents: Vec<Document>,
    pub total_documents: usize,
    pub total_pages: usize,
    pub page: usize,
}

/// Name of the collection holding `docs_table_name` documents for a project.
pub fn collection_name(project_id: &str, docs_table_name: &str) -> Result<String> {
    let name = format!("{project_id}_{docs_table_name}");
    validate_collection_name(&name)?;
    Ok(name)
}

/// Collection names become directory names, so keep them to a safe alphabet.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') {
        return Err(Error::InvalidInput(format!("invalid collection name '{name}'")));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))) {
        return Err(Error::InvalidInput(format!("invalid character '{c}' in collection name '{name}'")));
    }
    Ok(())
}
