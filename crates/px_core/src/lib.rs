pub mod error;
pub mod events;
pub mod models;
pub mod sources;
pub mod storage;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use events::{Phase, ProgressEvent, ProgressUpdate};
pub use models::{extract_json_object, InferenceModel, ResponseShape};
pub use sources::{Discovery, Retrieval, RetrievalProgress};
pub use storage::ResultCache;
pub use types::{
    AnalysisResult, Article, Bias, BiasCounts, CacheEntry, ClassifiedArticle, Narratives,
    ScrapeRecord, SourceRef, TopicHistory, EMPTY_NARRATIVE, MIN_CONTENT_CHARS,
};

pub mod prelude {
    pub use super::{
        Article, Bias, ClassifiedArticle, Discovery, Error, InferenceModel, Result, ResultCache,
        Retrieval,
    };
}
