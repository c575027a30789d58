// src/cache/sqlite.rs
use super::CacheBackend;
use crate::errors::CacheError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;

/// Backend on the `cache_entries` table, shared by every process pointed at
/// the same database file. Expiry is stored as epoch milliseconds.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Expects the `cache_entries` table created by `Database::migrate`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_millis())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE substr(key, 1, ?) = ?")
            .bind(prefix.chars().count() as i64)
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cache_entries WHERE substr(key, 1, ?) = ? AND expires_at > ?",
        )
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
