use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use px_core::{extract_json_object, Error, InferenceModel, ResponseShape, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq by
/// default).
pub struct ChatCompletionsModel {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for ChatCompletionsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ChatCompletionsModel {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        model: String,
        temperature: f32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url,
            model,
            temperature,
        })
    }

    async fn complete(&self, messages: Vec<ChatMessage>, json_mode: bool) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!("API key is required for model {}", self.model))
        })?;

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format: json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(Error::inference)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "{} returned {}: {}",
                self.model, status, body
            )));
        }

        let response = response
            .json::<ChatResponse>()
            .await
            .map_err(Error::inference)?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Inference(format!("{} returned no choices", self.model)))
    }
}

#[async_trait]
impl InferenceModel for ChatCompletionsModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn check_credentials(&self) -> Result<()> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(Error::Config(format!(
                "API key is required for model {}",
                self.model
            ))),
        }
    }

    async fn infer(&self, prompt: &str) -> Result<String> {
        tracing::debug!("🤖 {} <- {} chars", self.model, prompt.len());
        self.complete(
            vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            false,
        )
        .await
    }

    async fn infer_structured(&self, prompt: &str, shape: &ResponseShape) -> Result<Value> {
        let system = format!(
            "Reply with a single JSON object named {} that matches this JSON schema:\n{}",
            shape.name, shape.schema
        );
        let reply = self
            .complete(
                vec![
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt.to_string(),
                    },
                ],
                true,
            )
            .await?;
        extract_json_object(&reply)
    }
}
