use std::sync::Arc;

use px_core::{CacheEntry, Error, InferenceModel, Result, ResultCache};
use px_inference::prompts::chat_prompt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any analyzed articles for this topic in my \
     database. Please run a new analysis first.";

const SOURCE_ROWS: usize = 20;
const MAX_CONTEXT_CHARS: usize = 50_000;
const AUGMENT_CONTENT_CHARS: usize = 2_500;
const FALLBACK_CONTENT_CHARS: usize = 2_000;
const SOURCE_SEPARATOR: &str = "\n=== DETAILED SOURCE MATERIAL ===\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub topic: String,
    pub query: String,
    #[serde(default)]
    pub left_narrative: Option<String>,
    #[serde(default)]
    pub right_narrative: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    /// Add cached source material even when narratives were supplied.
    #[serde(default)]
    pub include_sources: bool,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Answers follow-up questions about an analyzed topic.
pub struct ChatService {
    model: Arc<dyn InferenceModel>,
    store: Arc<dyn ResultCache>,
}

impl ChatService {
    pub fn new(model: Arc<dyn InferenceModel>, store: Arc<dyn ResultCache>) -> Self {
        Self { model, store }
    }

    pub fn model(&self) -> &Arc<dyn InferenceModel> {
        &self.model
    }

    /// Supplied narratives come first. Cached rows for the topic are added
    /// when nothing was supplied or when the request asks for sources.
    pub async fn build_context(&self, request: &ChatRequest) -> Vec<String> {
        self.context_for(request.topic.trim(), request).await
    }

    async fn context_for(&self, topic: &str, request: &ChatRequest) -> Vec<String> {
        let mut context = Vec::new();
        if let Some(left) = non_blank(&request.left_narrative) {
            context.push(format!("LEFT-WING PERSPECTIVE:\n{}", left));
        }
        if let Some(right) = non_blank(&request.right_narrative) {
            context.push(format!("RIGHT-WING PERSPECTIVE:\n{}", right));
        }
        if let Some(overview) = non_blank(&request.overview) {
            context.push(format!("ANALYSIS OVERVIEW:\n{}", overview));
        }

        if !context.is_empty() && !request.include_sources {
            return context;
        }

        let rows = match self.store.entries_for_topic(topic, SOURCE_ROWS).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Could not load cached sources for '{}': {}", topic, e);
                Vec::new()
            }
        };
        let items: Vec<String> = rows
            .iter()
            .filter_map(|row| {
                if request.include_sources {
                    augment_item(row)
                } else {
                    fallback_item(row)
                }
            })
            .collect();
        debug!("Loaded {} cached item(s) for '{}'", items.len(), topic);

        if !context.is_empty() && !items.is_empty() {
            context.push(SOURCE_SEPARATOR.to_string());
        }
        context.extend(items);
        context
    }

    pub async fn answer(&self, request: &ChatRequest) -> Result<String> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(Error::Validation("Topic is required".to_string()));
        }

        let context = self.context_for(topic, request).await;
        if context.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let context = truncate_chars(&context.join("\n\n"), MAX_CONTEXT_CHARS);
        let reply = self.model.infer(&chat_prompt(&context, &request.query)).await?;
        Ok(reply.trim().to_string())
    }
}

fn augment_item(row: &CacheEntry) -> Option<String> {
    if row.has_content() {
        let content = row.content.as_deref().unwrap_or_default();
        Some(format!(
            "SOURCE ARTICLE ({}):\n{}",
            row.bias,
            truncate_chars(content, AUGMENT_CONTENT_CHARS)
        ))
    } else if row.has_summary() {
        Some(format!("SOURCE SUMMARY ({}):\n{}", row.bias, row.summary))
    } else {
        None
    }
}

fn fallback_item(row: &CacheEntry) -> Option<String> {
    if row.has_summary() {
        Some(format!("[{}] {}", row.bias, row.summary))
    } else {
        row.content
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| truncate_chars(c, FALLBACK_CONTENT_CHARS))
    }
}
