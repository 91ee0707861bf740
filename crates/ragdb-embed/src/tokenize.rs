use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use ragdb_core::error::{Error, Result};

const PAD_ID: u32 = 1;

/// Token ids and attention mask for one text, truncated or padded to `max_len`.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| Error::ProviderRejected(format!("tokenization failed: {e}")))?;
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
    if ids.len() < max_len { let pad = max_len - ids.len(); ids.extend(std::iter::repeat(PAD_ID).take(pad)); mask.extend(std::iter::repeat(0).take(pad)); }
    let to_tensor = |v: Vec<u32>| Tensor::from_iter(v, device).and_then(|t| t.reshape((1, max_len)));
    let input_ids = to_tensor(ids).map_err(|e| Error::ProviderRejected(e.to_string()))?;
    let attention_mask = to_tensor(mask).map_err(|e| Error::ProviderRejected(e.to_string()))?;
    Ok((input_ids, attention_mask))
}
