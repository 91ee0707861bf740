//! Embedding and completion providers: a deterministic `fake`, an
//! OpenAI-compatible HTTP client, and a local candle XLM-RoBERTa model, all
//! behind `LlmProvider` and wrapped in a retry policy.
pub mod device;
pub mod fake;
pub mod model;
pub mod openai;
pub mod pool;
pub mod registry;
pub mod retry;
pub mod tokenize;

pub use fake::FakeProvider;
pub use model::{LocalModel, LocalProvider};
pub use openai::OpenAiProvider;
pub use pool::masked_mean_l2;
pub use registry::{build_provider, provider_key, shared_provider};
pub use retry::{Resilient, RetryPolicy};
