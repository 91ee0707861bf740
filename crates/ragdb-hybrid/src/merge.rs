use std::collections::HashSet;

use ragdb_core::types::{MergePolicy, SearchResult};

/// `(vector_limit, text_limit)` for a hybrid query: `floor(top_k * scale)` and the rest.
pub fn split_limits(top_k: usize, hybrid_scale: f32) -> (usize, usize) {
	// Widening an f32 scale can land just under an integer product (0.7 * 10); nudge by one f32 epsilon.
	let raw = top_k as f64 * f64::from(hybrid_scale) * (1.0 + f64::from(f32::EPSILON));
	let vector_limit = (raw.floor().max(0.0) as usize).min(top_k);
	(vector_limit, top_k - vector_limit)
}

/// Vector hits first, then lexical hits whose id was not already taken.
///
/// Each side keeps its own rank order; under `Concatenate` the combined list
/// is not re-sorted.
pub fn merge_hybrid(
	vector_hits: Vec<SearchResult>,
	lexical_hits: Vec<SearchResult>,
	top_k: usize,
	hybrid_scale: f32,
	policy: MergePolicy,
) -> Vec<SearchResult> {
	let (vector_limit, text_limit) = split_limits(top_k, hybrid_scale);
	let mut merged: Vec<SearchResult> = vector_hits.into_iter().take(vector_limit).collect();
	let mut taken: HashSet<String> = merged.iter().map(|h| h.id.clone()).collect();
	let lexical: Vec<SearchResult> = lexical_hits.into_iter().filter(|h| taken.insert(h.id.clone())).take(text_limit).collect();
	merged.extend(lexical);
	if policy == MergePolicy::SortByScore {
		merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
	}
	merged
}
