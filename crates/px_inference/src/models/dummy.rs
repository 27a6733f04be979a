use std::fmt;

use async_trait::async_trait;
use px_core::{Bias, InferenceModel, ResponseShape, Result};
use serde_json::{json, Value};

use crate::prompts::ARTICLE_MARKER;

const RIGHT_OUTLETS: &[&str] = &[
    "foxnews", "breitbart", "nypost", "dailywire", "washingtontimes", "nationalreview",
];
const LEFT_OUTLETS: &[&str] = &["cnn", "msnbc", "nytimes", "theguardian", "huffpost"];

/// Offline model for local runs. Replies are derived from the prompt alone,
/// so the same prompt always produces the same answer.
#[derive(Default)]
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }

    fn body(prompt: &str) -> &str {
        prompt
            .rsplit_once(ARTICLE_MARKER)
            .map(|(_, body)| body)
            .unwrap_or(prompt)
    }

    fn guess_bias(text: &str) -> Bias {
        let lower = text.to_lowercase();
        if RIGHT_OUTLETS.iter().any(|o| lower.contains(o)) {
            Bias::Right
        } else if LEFT_OUTLETS.iter().any(|o| lower.contains(o)) {
            Bias::Left
        } else {
            Bias::Center
        }
    }

    fn first_words(text: &str, n: usize) -> String {
        text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
impl InferenceModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn infer(&self, prompt: &str) -> Result<String> {
        let last = prompt
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .last()
            .unwrap_or(prompt);
        Ok(Self::first_words(last, 40))
    }

    async fn infer_structured(&self, prompt: &str, _shape: &ResponseShape) -> Result<Value> {
        let body = Self::body(prompt);
        Ok(json!({
            "bias": Self::guess_bias(body).as_str(),
            "summary": Self::first_words(body, 20),
        }))
    }
}
