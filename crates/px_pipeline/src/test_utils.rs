//! In-process stand-ins for the pipeline's collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use px_core::{
    Bias, Discovery, Error, InferenceModel, ResponseShape, Result, ResultCache, Retrieval,
    RetrievalProgress, ScrapeRecord,
};
use serde_json::{json, Value};

use crate::{Pipeline, PipelineConfig};

/// Builds a successful record whose content carries a lean marker the
/// [`ScriptedModel`] understands: `LEFT`, `RIGHT`, `FAIL`, anything else
/// is center.
pub fn record(url: &str, marker: &str) -> ScrapeRecord {
    ScrapeRecord {
        url: url.to_string(),
        title: format!("Story at {}", url),
        content: Some(format!("{} {}", marker, "lorem ipsum dolor sit amet ".repeat(8))),
        status: Some("success".to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct StaticDiscovery {
    pub urls: Vec<String>,
    pub missing_key: bool,
}

impl StaticDiscovery {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            missing_key: false,
        }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    fn name(&self) -> &str {
        "static"
    }

    fn check_credentials(&self) -> Result<()> {
        if self.missing_key {
            return Err(Error::Config("SERP_API_KEY is missing".to_string()));
        }
        Ok(())
    }

    async fn discover(&self, _topic: &str) -> Result<Vec<String>> {
        Ok(self.urls.clone())
    }
}

/// Serves canned records for requested URLs, one progress tick per URL.
#[derive(Debug, Default)]
pub struct StaticRetrieval {
    pub records: Vec<ScrapeRecord>,
    pub calls: AtomicUsize,
}

impl StaticRetrieval {
    pub fn new(records: Vec<ScrapeRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Retrieval for StaticRetrieval {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(
        &self,
        urls: &[String],
        on_progress: Option<RetrievalProgress>,
    ) -> Result<Vec<ScrapeRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::new();
        for (i, url) in urls.iter().enumerate() {
            out.extend(self.records.iter().filter(|r| &r.url == url).cloned());
            if let Some(report) = &on_progress {
                report(i + 1, urls.len());
            }
        }
        Ok(out)
    }
}

/// Deterministic model that records every call.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    pub classify_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    pub fail_free_text: bool,
    pub missing_key: bool,
}

impl ScriptedModel {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn free_text_prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InferenceModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn check_credentials(&self) -> Result<()> {
        if self.missing_key {
            return Err(Error::Config("API key is required for model scripted".to_string()));
        }
        Ok(())
    }

    async fn infer(&self, prompt: &str) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_free_text {
            return Err(Error::Inference("model overloaded".to_string()));
        }
        let mut prompts = self
            .prompts
            .lock()
            .map_err(|e| Error::Inference(e.to_string()))?;
        prompts.push(prompt.to_string());
        Ok(format!("generated text #{}", prompts.len()))
    }

    async fn infer_structured(&self, prompt: &str, _shape: &ResponseShape) -> Result<Value> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let body = prompt.rsplit("Article Text:\n").next().unwrap_or(prompt);
        let bias = if body.starts_with("FAIL") {
            return Err(Error::Inference("malformed reply".to_string()));
        } else if body.starts_with("LEFT") {
            Bias::Left.as_str()
        } else if body.starts_with("RIGHT") {
            Bias::Right.as_str()
        } else if body.starts_with("ODD") {
            "Far-Left"
        } else {
            Bias::Center.as_str()
        };
        let head: String = body.chars().take(12).collect();
        Ok(json!({ "bias": bias, "summary": format!("summary of {}", head.trim()) }))
    }
}

/// Wires a pipeline around the given collaborators with default sizing.
pub fn pipeline(
    discovery: Arc<dyn Discovery>,
    retrieval: Arc<dyn Retrieval>,
    model: Arc<dyn InferenceModel>,
    store: Arc<dyn ResultCache>,
) -> Result<Pipeline> {
    Pipeline::new(
        discovery,
        retrieval,
        vec![model.clone()],
        model,
        store,
        &PipelineConfig::default(),
    )
}
