//! Process-wide provider cache.
//!
//! Each distinct `"{provider}:{model_id}"` is constructed once and shared;
//! loading a local model is expensive and API clients keep connection pools.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::info;

use ragdb_core::config::{expand_path, EmbeddingSettings};
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::LlmProvider;

use crate::fake::FakeProvider;
use crate::model::{resolve_model_dir, LocalModel, LocalProvider};
use crate::openai::OpenAiProvider;
use crate::retry::{Resilient, RetryPolicy};

static PROVIDERS: OnceLock<Mutex<HashMap<String, Arc<dyn LlmProvider>>>> = OnceLock::new();

pub fn provider_key(settings: &EmbeddingSettings) -> String {
    format!("{}:{}", settings.provider, settings.model_id)
}

/// The cached provider for `settings`, building it on first use.
pub fn shared_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn LlmProvider>> {
    let key = provider_key(settings);
    let mut providers = PROVIDERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .map_err(|_| Error::Configuration("provider registry lock poisoned".into()))?;
    if let Some(p) = providers.get(&key) {
        return Ok(Arc::clone(p));
    }
    let provider = build_provider(settings)?;
    providers.insert(key.clone(), Arc::clone(&provider));
    info!(provider = %key, dim = provider.dim(), "provider ready");
    Ok(provider)
}

/// Build an uncached provider wrapped in the configured retry policy.
pub fn build_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn LlmProvider>> {
    let inner: Arc<dyn LlmProvider> = match settings.provider.as_str() {
        "fake" => Arc::new(FakeProvider::new(&settings.model_id, settings.embedding_size)),
        "openai" => Arc::new(OpenAiProvider::new(settings)?),
        "local" => {
            let dir = resolve_model_dir(settings.model_dir.as_deref().map(expand_path))?;
            let model = LocalModel::load(&dir)?;
            if model.hidden_size() != settings.embedding_size {
                return Err(Error::Configuration(format!(
                    "local model '{}' produces {} values, embedding_size is {}",
                    settings.model_id,
                    model.hidden_size(),
                    settings.embedding_size
                )));
            }
            Arc::new(LocalProvider::new(&settings.model_id, model))
        }
        other => return Err(Error::Configuration(format!("{other} provider is not supported"))),
    };
    Ok(Arc::new(Resilient::new(inner, RetryPolicy::from(settings))))
}
