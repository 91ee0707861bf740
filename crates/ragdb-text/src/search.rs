use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};
use tracing::{debug, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::TextIndexer;
use ragdb_core::types::{Document, SearchResult, SourceKind};

use crate::index::LexicalIndex;

impl LexicalIndex {
	/// BM25 search over `text`, optionally restricted to one `file_name`.
	///
	/// Returned scores are normalised within the result set so they sum to 1.
	pub fn search_text(&self, query_text: &str, top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
		if top_k == 0 || query_text.trim().is_empty() {
			return Ok(vec![]);
		}
		let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (text_query, errors) = parser.parse_query_lenient(&strip_field_syntax(query_text));
		if !errors.is_empty() {
			warn!(query = query_text, errors = ?errors, "lenient query parse dropped parts of the query");
		}
		let query: Box<dyn Query> = match file_name {
			Some(f) => {
				let term = Term::from_field_text(self.file_name_field, f);
				// Zero-scoring clause so the filter does not perturb BM25.
				let partition: Box<dyn Query> =
					Box::new(ConstScoreQuery::new(Box::new(TermQuery::new(term, IndexRecordOption::Basic)), 0.0));
				Box::new(BooleanQuery::new(vec![(Occur::Must, text_query), (Occur::Must, partition)]))
			}
			None => text_query,
		};

		let searcher = self.reader.searcher();
		// The collector preallocates for its limit.
		let limit = top_k.min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX));
		if limit == 0 {
			return Ok(vec![]);
		}
		let top_docs = searcher.search(query.as_ref(), &TopDocs::with_limit(limit)).map_err(Error::storage)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::storage)?;
			let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			let text = doc.get_first(self.text_field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			hits.push(SearchResult { id, text, score, source: SourceKind::Lexical });
		}
		debug!(query = query_text, hits = hits.len(), "lexical search");
		Ok(normalize_in_set(hits))
	}
}

/// Queries only ever target `text`; a `field:` prefix is treated as plain words.
fn strip_field_syntax(query_text: &str) -> String {
	query_text.replace(':', " ")
}

/// Divide every score by the sum of scores in `hits`.
///
/// An empty set, or one whose score sum is not a positive finite number,
/// yields an empty list.
pub fn normalize_in_set(mut hits: Vec<SearchResult>) -> Vec<SearchResult> {
	let sum: f32 = hits.iter().map(|h| h.score).sum();
	if hits.is_empty() || !sum.is_finite() || sum <= 0.0 {
		return vec![];
	}
	for h in &mut hits {
		h.score /= sum;
	}
	hits
}

impl TextIndexer for LexicalIndex {
	fn rebuild(&self, documents: &[Document]) -> Result<()> {
		LexicalIndex::rebuild(self, documents)
	}

	fn search_text(&self, query: &str, top_k: usize, file_name: Option<&str>) -> Result<Vec<SearchResult>> {
		LexicalIndex::search_text(self, query, top_k, file_name)
	}

	fn num_docs(&self) -> u64 {
		LexicalIndex::num_docs(self)
	}
}
