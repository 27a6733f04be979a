use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Result};

/// Shape requested from a structured inference call.
#[derive(Debug, Clone)]
pub struct ResponseShape {
    pub name: &'static str,
    pub schema: Value,
}

#[async_trait]
pub trait InferenceModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Fails with `Error::Config` when the model cannot be called at all.
    fn check_credentials(&self) -> Result<()> {
        Ok(())
    }

    /// Free-text completion for a prompt.
    async fn infer(&self, prompt: &str) -> Result<String>;

    /// Completion constrained to a JSON object of the given shape.
    async fn infer_structured(&self, prompt: &str, shape: &ResponseShape) -> Result<Value> {
        let prompt = format!(
            "{}\n\nRespond with only a JSON object named {} matching this schema:\n{}",
            prompt, shape.name, shape.schema
        );
        let reply = self.infer(&prompt).await?;
        extract_json_object(&reply)
    }
}

/// Pulls the outermost JSON object out of a model reply, tolerating code
/// fences and chatter around it.
pub fn extract_json_object(reply: &str) -> Result<Value> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&reply[start..=end])
            .map_err(|e| Error::Inference(format!("Malformed structured reply: {}", e))),
        _ => Err(Error::Inference("Reply did not contain a JSON object".to_string())),
    }
}
