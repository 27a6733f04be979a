use px_core::{Error, Result};

pub mod models;
pub mod prompts;

pub use models::{create_model, ModelRole};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Inference provider settings shared by every model role.
#[derive(Debug, Clone)]
pub struct Config {
    /// `groq` (any OpenAI-compatible endpoint) or `dummy`.
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub classification_model: String,
    pub synthesis_model: String,
    pub chat_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            api_key: None,
            base_url: None,
            classification_model: "llama-3.3-70b-versatile".to_string(),
            synthesis_model: "meta-llama/llama-4-maverick-17b-128e-instruct".to_string(),
            chat_model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
        }
    }
}

impl Config {
    pub fn base_url(&self) -> Result<String> {
        let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let parsed = url::Url::parse(raw)
            .map_err(|e| Error::Config(format!("Invalid model URL {}: {}", raw, e)))?;
        Ok(parsed.as_str().trim_end_matches('/').to_string())
    }
}

pub mod prelude {
    pub use super::models::{create_model, ModelRole};
    pub use super::Config;
    pub use px_core::{Error, InferenceModel, Result};
}
