//! Local XLM-RoBERTa (BGE-M3 style) embedding model on candle.
//!
//! The model directory must contain `tokenizer.json`, `config.json` and either
//! `model.safetensors` or `pytorch_model.bin`. Inference runs on the blocking
//! pool; this provider has no completion model.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::LlmProvider;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

const MAX_LEN: usize = 256;

pub struct LocalModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, hidden_size: usize }

fn load_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Configuration(format!("failed to load {}: {e}", path.display()))
}

fn inference_error(e: candle_core::Error) -> Error {
    Error::ProviderRejected(format!("local model inference failed: {e}"))
}

impl LocalModel {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading local embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| load_error(&tokenizer_path, e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).map_err(|e| load_error(&config_path, e))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw).map_err(|e| load_error(&config_path, e))?;
        let hidden_size = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("hidden_size").and_then(serde_json::Value::as_u64))
            .ok_or_else(|| load_error(&config_path, "missing hidden_size"))? as usize;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb).map_err(|e| load_error(model_dir, e))?;
        info!(hidden_size, "local embedding model loaded");
        Ok(Self { model, tokenizer, device, hidden_size })
    }

    pub fn hidden_size(&self) -> usize { self.hidden_size }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, MAX_LEN, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device).map_err(inference_error)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None).map_err(inference_error)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(inference_error)?;
        let mut rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu).and_then(|t| t.to_vec2()).map_err(inference_error)?;
        let emb = rows.pop().ok_or_else(|| Error::ProviderRejected("local model produced no embedding".into()))?;
        if start.elapsed().as_millis() > 100 { debug!(ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return candle_core::safetensors::load(&safetensors, device).map_err(|e| load_error(&safetensors, e));
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&pickle).map_err(|e| load_error(&pickle, e))?;
    Ok(weights.into_iter().collect())
}

/// Model directory: the configured one, else `APP_MODEL_DIR`, else `models/bge-m3`.
pub fn resolve_model_dir(configured: Option<PathBuf>) -> Result<PathBuf> {
    let candidates = configured.into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain([PathBuf::from("models/bge-m3")]);
    for p in candidates {
        if p.exists() { return Ok(p); }
        warn!(dir = %p.display(), "model directory not found");
    }
    Err(Error::Configuration("could not locate a local model directory".into()))
}

pub struct LocalProvider { model: Arc<LocalModel>, model_id: String }

impl LocalProvider {
    pub fn new(model_id: &str, model: LocalModel) -> Self {
        Self { model: Arc::new(model), model_id: model_id.to_string() }
    }
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.model.hidden_size() }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || texts.iter().map(|t| model.embed_text(t)).collect())
            .await
            .map_err(|e| Error::Provider(format!("embedding task failed: {e}")))?
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Err(Error::Configuration(format!("local provider '{}' has no completion model", self.model_id)))
    }
}
