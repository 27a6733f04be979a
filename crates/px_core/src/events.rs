use serde::{Deserialize, Serialize};

use crate::types::AnalysisResult;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discovery,
    Scraping,
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub percent: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(phase: Phase, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent,
            message: message.into(),
            current: None,
            total: None,
        }
    }

    pub fn with_counts(mut self, current: usize, total: usize) -> Self {
        self.current = Some(current);
        self.total = Some(total);
        self
    }
}

/// Event emitted by a streamed analysis run. A run yields any number of
/// `Progress` events followed by exactly one `Result` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress(ProgressUpdate),
    Result { data: AnalysisResult },
    Error { detail: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress(_))
    }

    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::Progress(update) => Some(update.percent),
            _ => None,
        }
    }

    /// Renders the event as one server-sent-events frame: `data: <json>`
    /// followed by a blank line.
    pub fn to_sse_frame(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
