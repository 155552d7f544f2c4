//! Durable local cache of response documents.
//!
//! One row per document id holding the last-known-good JSON the server
//! returned. The cache is a fallback only, never the system of record, and
//! writes are last-write-wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::domain::{DocumentId, ResponseDocument};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::warn;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub document: ResponseDocument,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocumentSummary {
    pub document_id: DocumentId,
    pub title: String,
    pub cached_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn put_document(&self, document: &ResponseDocument) -> Result<()> {
        let payload = serde_json::to_string(document)
            .with_context(|| format!("failed to encode document {}", document.id))?;
        sqlx::query(
            "INSERT INTO cached_documents (document_id, title, payload, cached_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(document_id) DO UPDATE SET
                title = excluded.title,
                payload = excluded.payload,
                cached_at = excluded.cached_at",
        )
        .bind(document.id.as_str())
        .bind(&document.title)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to cache document {}", document.id))?;
        Ok(())
    }

    /// Returns `None` when nothing is cached, or when the cached payload no
    /// longer decodes into a usable document.
    pub async fn load_document(&self, document_id: &DocumentId) -> Result<Option<CachedDocument>> {
        let row = sqlx::query(
            "SELECT payload, cached_at FROM cached_documents WHERE document_id = ?",
        )
        .bind(document_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read cached document {document_id}"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("payload")?;
        let cached_at: String = row.try_get("cached_at")?;

        let document = match serde_json::from_str::<serde_json::Value>(&payload)
            .map_err(anyhow::Error::from)
            .and_then(|value| ResponseDocument::decode(value).map_err(anyhow::Error::from))
        {
            Ok(document) => document,
            Err(err) => {
                warn!(document_id = %document_id, error = %err, "discarding undecodable cache entry");
                return Ok(None);
            }
        };

        Ok(Some(CachedDocument {
            document,
            cached_at: parse_cached_at(&cached_at),
        }))
    }

    pub async fn delete_document(&self, document_id: &DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cached_documents WHERE document_id = ?")
            .bind(document_id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete cached document {document_id}"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_documents(&self) -> Result<Vec<CachedDocumentSummary>> {
        let rows = sqlx::query(
            "SELECT document_id, title, cached_at FROM cached_documents
             ORDER BY cached_at DESC, document_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list cached documents")?;

        Ok(rows
            .into_iter()
            .map(|r| CachedDocumentSummary {
                document_id: DocumentId(r.get::<String, _>(0)),
                title: r.get::<String, _>(1),
                cached_at: parse_cached_at(&r.get::<String, _>(2)),
            })
            .collect())
    }

    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_documents")
            .execute(&self.pool)
            .await
            .context("failed to clear document cache")?;
        Ok(result.rows_affected())
    }
}

fn parse_cached_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
