//! OpenAI-compatible HTTP provider (`/embeddings`, `/chat/completions`).
//!
//! Status mapping: 429 and 5xx are transient (`Provider`), any other non-2xx
//! is a rejection (`ProviderRejected`). Network failures are transient.
//! Retries are applied by [`crate::retry::Resilient`], not here.
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::LlmProvider;

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    completion_model: Option<String>,
    dim: usize,
}

impl OpenAiProvider {
    /// Fails with `Configuration` when the API key variable is unset.
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| Error::Configuration(format!("{} environment variable not set", settings.api_key_env)))?;
        Ok(Self::with_key(settings, api_key))
    }

    pub fn with_key(settings: &EmbeddingSettings, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model_id.clone(),
            completion_model: settings.completion_model.clone(),
            dim: settings.embedding_size,
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| Error::Provider(format!("invalid response body: {e}")));
        }
        let body_text = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body_text))
    }
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("API error {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::Provider(message)
    } else {
        Error::ProviderRejected(message)
    }
}

/// Embeddings from an `/embeddings` response, ordered by their `index` field.
pub(crate) fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::ProviderRejected("invalid embeddings response: missing data array".into()))?;
    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::ProviderRejected("invalid embeddings response: missing embedding".into()))?;
        let index = item.get("index").and_then(serde_json::Value::as_u64).map_or(pos, |i| i as usize);
        indexed.push((index, embedding.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect::<Vec<f32>>()));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

pub(crate) fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::ProviderRejected("invalid completion response: missing choices[0].message.content".into()))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_id(&self) -> &str { &self.model }
    fn dim(&self) -> usize { self.dim }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = self.post("embeddings", &body).await?;
        let vectors = parse_embeddings(&json)?;
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::ShapeMismatch(format!("provider returned {} values per vector, expected {}", v.len(), self.dim)));
        }
        debug!(model = %self.model, inputs = texts.len(), "embedded batch");
        Ok(vectors)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let model = self
            .completion_model
            .as_ref()
            .ok_or_else(|| Error::Configuration("embedding.completion_model is not set".into()))?;
        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        let json = self.post("chat/completions", &body).await?;
        parse_completion(&json)
    }
}
