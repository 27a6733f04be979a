use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Articles whose resolved content is shorter than this (in characters)
/// never reach classification.
pub const MIN_CONTENT_CHARS: usize = 100;

/// Narrative text used for a bias group with no members. No inference call
/// is made when this is used.
pub const EMPTY_NARRATIVE: &str = "No articles found for this perspective.";

/// A record as returned by the retrieval service. Field presence varies
/// between service versions, so everything is optional and unknown fields
/// are kept for the last-resort content fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRecord {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScrapeRecord {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub source: String,
    pub content: String,
}

impl Article {
    /// Ingests a retrieval record. Returns `None` for failed records and
    /// records without a URL.
    ///
    /// Content resolution order, evaluated once here:
    /// 1. `content`, when non-empty
    /// 2. `text`, when non-empty
    /// 3. the record serialized as JSON
    pub fn from_record(record: ScrapeRecord) -> Option<Self> {
        if !record.is_success() || record.url.trim().is_empty() {
            return None;
        }

        let content = match (&record.content, &record.text) {
            (Some(content), _) if !content.trim().is_empty() => content.clone(),
            (_, Some(text)) if !text.trim().is_empty() => text.clone(),
            _ => serde_json::to_string(&record).unwrap_or_default(),
        };

        let source = record
            .source
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| host_of(&record.url))
            .unwrap_or_default();

        Some(Self {
            url: record.url,
            title: record.title,
            source,
            content,
        })
    }

    pub fn is_classifiable(&self) -> bool {
        self.content.chars().count() >= MIN_CONTENT_CHARS
    }

    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            url: self.url.clone(),
            title: self.title.clone(),
            source: self.source.clone(),
        }
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    Left,
    Center,
    Right,
}

impl Bias {
    pub const ALL: [Bias; 3] = [Bias::Left, Bias::Center, Bias::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Left => "Left",
            Bias::Center => "Center",
            Bias::Right => "Right",
        }
    }

    /// Maps a model-produced label onto a bias. Anything outside the three
    /// known labels counts as `Center`.
    pub fn coerce(label: &str) -> Self {
        label.parse().unwrap_or(Bias::Center)
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Left" => Ok(Bias::Left),
            "Center" => Ok(Bias::Center),
            "Right" => Ok(Bias::Right),
            other => Err(Error::Validation(format!("Unknown bias label: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedArticle {
    pub url: String,
    pub bias: Bias,
    pub summary: String,
}

/// One row of the result cache. Keyed by URL across all topics: a URL that
/// has been classified once is never reclassified, later runs only rebind
/// `topic` and backfill a missing `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub topic: String,
    pub bias: Bias,
    pub summary: String,
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(topic: &str, article: &Article, classified: &ClassifiedArticle) -> Self {
        Self {
            url: article.url.clone(),
            topic: topic.to_string(),
            bias: classified.bias,
            summary: classified.summary.clone(),
            content: Some(article.content.clone()),
            updated_at: Utc::now(),
        }
    }

    pub fn classified(&self) -> ClassifiedArticle {
        ClassifiedArticle {
            url: self.url.clone(),
            bias: self.bias,
            summary: self.summary.clone(),
        }
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.trim().is_empty()
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasCounts {
    #[serde(rename = "Left")]
    pub left: usize,
    #[serde(rename = "Center")]
    pub center: usize,
    #[serde(rename = "Right")]
    pub right: usize,
}

impl BiasCounts {
    pub fn record(&mut self, bias: Bias) {
        match bias {
            Bias::Left => self.left += 1,
            Bias::Center => self.center += 1,
            Bias::Right => self.right += 1,
        }
    }

    pub fn get(&self, bias: Bias) -> usize {
        match bias {
            Bias::Left => self.left,
            Bias::Center => self.center,
            Bias::Right => self.right,
        }
    }

    pub fn total(&self) -> usize {
        self.left + self.center + self.right
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narratives {
    #[serde(rename = "Left")]
    pub left: String,
    #[serde(rename = "Right")]
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub topic: String,
    pub bias_counts: BiasCounts,
    pub narratives: Narratives,
    pub omission_report: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicHistory {
    pub topic: String,
    pub last_run: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str) -> ScrapeRecord {
        ScrapeRecord {
            url: "https://www.example.com/a".to_string(),
            title: "A".to_string(),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_prefers_primary_field() {
        let mut rec = record("success");
        rec.content = Some("primary".to_string());
        rec.text = Some("secondary".to_string());
        let article = Article::from_record(rec).unwrap();
        assert_eq!(article.content, "primary");
    }

    #[test]
    fn test_content_falls_back_to_text_then_record() {
        let mut rec = record("success");
        rec.content = Some(String::new());
        rec.text = Some("secondary".to_string());
        assert_eq!(Article::from_record(rec).unwrap().content, "secondary");

        let rec = record("success");
        let article = Article::from_record(rec).unwrap();
        assert!(article.content.contains("\"url\":\"https://www.example.com/a\""));
    }

    #[test]
    fn test_failed_records_are_not_ingested() {
        assert!(Article::from_record(record("HTTP Error: 404")).is_none());
        let mut rec = record("success");
        rec.status = None;
        assert!(Article::from_record(rec).is_none());
    }

    #[test]
    fn test_source_defaults_to_host() {
        let mut rec = record("success");
        rec.content = Some("x".repeat(120));
        assert_eq!(Article::from_record(rec).unwrap().source, "example.com");
    }

    #[test]
    fn test_classifiable_threshold() {
        let mut article = Article {
            url: "u".into(),
            title: "t".into(),
            source: "s".into(),
            content: "x".repeat(99),
        };
        assert!(!article.is_classifiable());
        article.content.push('x');
        assert!(article.is_classifiable());
    }

    #[test]
    fn test_bias_coercion() {
        assert_eq!(Bias::coerce("Left"), Bias::Left);
        assert_eq!(Bias::coerce(" Right "), Bias::Right);
        assert_eq!(Bias::coerce("left"), Bias::Center);
        assert_eq!(Bias::coerce("RIGHT"), Bias::Center);
        assert_eq!(Bias::coerce("Center-Left"), Bias::Center);
        assert_eq!(Bias::coerce(""), Bias::Center);
    }

    #[test]
    fn test_bias_counts_wire_names() {
        let mut counts = BiasCounts::default();
        counts.record(Bias::Left);
        counts.record(Bias::Right);
        counts.record(Bias::Right);
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json, serde_json::json!({"Left": 1, "Center": 0, "Right": 2}));
        assert_eq!(counts.total(), 3);
    }
}
