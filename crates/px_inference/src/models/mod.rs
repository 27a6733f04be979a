use std::sync::Arc;

use px_core::{Error, InferenceModel, Result};

use crate::Config;

pub mod chat;
pub mod dummy;

pub use chat::ChatCompletionsModel;
pub use dummy::DummyModel;

/// The job a model is used for. Each role carries its own model id and
/// sampling temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Classification,
    Synthesis,
    Chat,
}

impl ModelRole {
    pub fn temperature(&self) -> f32 {
        match self {
            ModelRole::Classification => 0.0,
            ModelRole::Synthesis => 0.3,
            ModelRole::Chat => 0.5,
        }
    }

    fn model_id<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            ModelRole::Classification => &config.classification_model,
            ModelRole::Synthesis => &config.synthesis_model,
            ModelRole::Chat => &config.chat_model,
        }
    }
}

pub fn create_model(config: &Config, role: ModelRole) -> Result<Arc<dyn InferenceModel>> {
    match config.provider.to_ascii_lowercase().as_str() {
        "dummy" => Ok(Arc::new(DummyModel::new())),
        "groq" | "openai" => {
            let model = ChatCompletionsModel::new(
                config.api_key.clone(),
                config.base_url()?,
                role.model_id(config).to_string(),
                role.temperature(),
            )?;
            Ok(Arc::new(model))
        }
        other => Err(Error::Config(format!(
            "Unknown model provider: {}. Available providers: groq (default), openai, dummy",
            other
        ))),
    }
}
