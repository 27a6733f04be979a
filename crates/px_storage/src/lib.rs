use std::sync::Arc;

use px_core::{Error, Result, ResultCache};

pub mod backends;

pub use backends::*;

/// Default on-disk location for the SQLite cache.
pub const DEFAULT_DB_PATH: &str = "analysis.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    SQLite,
}

impl std::str::FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::SQLite),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// Builds the process-wide store handle. Call once at startup and pass the
/// handle to every component that needs it.
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Arc<dyn ResultCache>> {
    match kind.parse::<StorageKind>()? {
        StorageKind::Memory => {
            let _ = url;
            Ok(Arc::new(MemoryStorage::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageKind::SQLite => {
            let path = sqlite_path(url.unwrap_or(DEFAULT_DB_PATH));
            let storage = SQLiteStorage::new_with_path(&path).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageKind::SQLite => Err(Error::Config(
            "SQLite support was not compiled in (enable the `sqlite` feature)".to_string(),
        )),
    }
}

/// Accepts `sqlite://path`, `sqlite:path` or a bare path.
pub fn sqlite_path(url: &str) -> std::path::PathBuf {
    let trimmed = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    std::path::PathBuf::from(trimmed)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageKind};
}
