use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use px_core::{Bias, CacheEntry, Error, Result, ResultCache, TopicHistory};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS analysis_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT,
        topic TEXT,
        url TEXT,
        bias_rating TEXT,
        summary TEXT,
        content TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_analysis_results_url ON analysis_results (url)
    "#,
    // Add future migrations here
];

const COLUMNS: &str = "id, timestamp, topic, url, bias_rating, summary, content";

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl std::fmt::Debug for SQLiteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SQLiteStorage")
            .field("db_path", &self.db_path)
            .finish()
    }
}

fn store_err(context: &str, e: sqlx::Error) -> Error {
    Error::Store(format!("{}: {}", context, e))
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: Option<String>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::Store(format!("Failed to parse timestamp {}: {}", raw, e))),
        None => Ok(DateTime::<Utc>::default()),
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<CacheEntry> {
    let get_text = |name: &str| -> Result<Option<String>> {
        row.try_get::<Option<String>, _>(name)
            .map_err(|e| store_err("Failed to decode row", e))
    };

    Ok(CacheEntry {
        url: get_text("url")?.unwrap_or_default(),
        topic: get_text("topic")?.unwrap_or_default(),
        bias: Bias::coerce(&get_text("bias_rating")?.unwrap_or_default()),
        summary: get_text("summary")?.unwrap_or_default(),
        content: get_text("content")?,
        updated_at: parse_timestamp(get_text("timestamp")?)?,
    })
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| store_err("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| store_err(&format!("Failed to run migration {}", i), e))?;
        }

        tracing::info!("💾 SQLite cache ready at {}", db_path.display());
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Number of stored rows, duplicates included.
    pub async fn row_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM analysis_results")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err("Failed to count rows", e))?;
        row.try_get::<i64, _>("n")
            .map_err(|e| store_err("Failed to decode row count", e))
    }
}

#[async_trait]
impl ResultCache for SQLiteStorage {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn lookup(&self, url: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM analysis_results WHERE url = ? ORDER BY id DESC LIMIT 1",
            COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("Failed to look up cached result", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_results (timestamp, topic, url, bias_rating, summary, content)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(timestamp(&entry.updated_at))
        .bind(&entry.topic)
        .bind(&entry.url)
        .bind(entry.bias.as_str())
        .bind(&entry.summary)
        .bind(entry.content.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to insert cached result", e))?;
        Ok(())
    }

    async fn update(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE analysis_results
            SET timestamp = ?, topic = ?, bias_rating = ?, summary = ?, content = ?
            WHERE url = ?
            "#,
        )
        .bind(timestamp(&entry.updated_at))
        .bind(&entry.topic)
        .bind(entry.bias.as_str())
        .bind(&entry.summary)
        .bind(entry.content.as_deref())
        .bind(&entry.url)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("Failed to update cached result", e))?;
        Ok(())
    }

    async fn entries_for_topic(&self, topic: &str, limit: usize) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM analysis_results
            WHERE LOWER(topic) = LOWER(?)
            AND (summary IS NOT NULL OR content IS NOT NULL)
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
            COLUMNS
        ))
        .bind(topic)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load topic entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn recent_topics(&self, limit: usize) -> Result<Vec<TopicHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT topic, MAX(timestamp) AS last_run
            FROM analysis_results
            WHERE topic IS NOT NULL AND topic != ''
            GROUP BY topic
            ORDER BY last_run DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("Failed to load history", e))?;

        rows.iter()
            .map(|row| {
                let topic: String = row
                    .try_get("topic")
                    .map_err(|e| store_err("Failed to decode topic", e))?;
                let last_run: Option<String> = row
                    .try_get("last_run")
                    .map_err(|e| store_err("Failed to decode last_run", e))?;
                Ok(TopicHistory {
                    topic,
                    last_run: parse_timestamp(last_run)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("Database ping failed", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
