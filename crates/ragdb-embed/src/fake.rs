use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use ragdb_core::error::Result;
use ragdb_core::traits::LlmProvider;

/// Deterministic hashed bag-of-words embedder. Needs no model files or network.
///
/// Texts sharing tokens get similar vectors, which is enough for tests and
/// offline demos. Completions echo the user prompt.
pub struct FakeProvider { model_id: String, dim: usize }

impl FakeProvider {
    pub fn new(model_id: &str, dim: usize) -> Self { Self { model_id: model_id.to_string(), dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
    async fn complete(&self, _system: &str, user: &str) -> Result<String> { Ok(user.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_are_unit_length_and_deterministic() {
        let p = FakeProvider::new("hash", 64);
        let a = p.embed_text("hello world");
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3);
        assert_eq!(a, p.embed_text("hello world"));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        assert!(FakeProvider::new("hash", 8).embed_text("").iter().all(|x| *x == 0.0));
    }
}
