// src/core/database.rs
//! System of record: organizations, job postings and the shared cache table

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::app_log;
use crate::core::FsOps;
use crate::etl::organization_key;
use crate::types::JobDraft;

// ===== Core Database Connection Management =====

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            FsOps::ensure_dir_exists(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to database: {}", database_path.display())
            })?;

        app_log!(
            info,
            "Database connection established: {}",
            database_path.display()
        );

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database, mainly for tests and dry runs.
    ///
    /// Pinned to a single connection that never recycles, since every new
    /// `:memory:` connection would be an empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes; safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                normalized_name TEXT NOT NULL UNIQUE,
                industry TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create organizations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_postings (
                id TEXT PRIMARY KEY,
                external_url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                city TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                employment_type TEXT,
                seniority_level TEXT,
                function TEXT,
                compensation_text TEXT,
                posted_at TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create job_postings table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create cache_entries table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_job_postings_organization ON job_postings(organization_id);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_postings_created_at ON job_postings(created_at);")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);")
            .execute(&self.pool)
            .await?;

        app_log!(debug, "Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}

// ===== Models =====

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobPosting {
    pub id: String,
    pub external_url: String,
    pub title: String,
    pub organization_id: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub employment_type: Option<String>,
    pub seniority_level: Option<String>,
    pub function: Option<String>,
    pub compensation_text: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ===== Organization Repository =====

pub struct OrganizationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrganizationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get-or-create by normalized name on an open connection or transaction.
    ///
    /// Relies on `UNIQUE(normalized_name)`: concurrent runs racing on the same
    /// name both end up with the one stored row. A known industry fills in a
    /// previously empty one.
    pub async fn get_or_create_in(
        conn: &mut SqliteConnection,
        name: &str,
        industry: Option<&str>,
    ) -> Result<Organization, sqlx::Error> {
        let normalized_name = organization_key(name);

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, normalized_name, industry, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(normalized_name) DO UPDATE
                SET industry = COALESCE(organizations.industry, excluded.industry)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name.trim())
        .bind(&normalized_name)
        .bind(industry)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, normalized_name, industry, created_at
            FROM organizations
            WHERE normalized_name = ?
            "#,
        )
        .bind(&normalized_name)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Organization>> {
        let organization = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, normalized_name, industry, created_at
            FROM organizations
            WHERE normalized_name = ?
            "#,
        )
        .bind(organization_key(name))
        .fetch_optional(self.pool)
        .await?;

        Ok(organization)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

// ===== Job Posting Repository =====

pub struct JobPostingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobPostingRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert unless a posting with the same `external_url` exists.
    /// Returns whether a row was written.
    pub async fn insert_if_absent_in(
        conn: &mut SqliteConnection,
        draft: &JobDraft,
        organization_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_postings (
                id, external_url, title, organization_id, city, state, country,
                employment_type, seniority_level, function, compensation_text,
                posted_at, description, is_active, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?)
            ON CONFLICT(external_url) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&draft.external_url)
        .bind(&draft.title)
        .bind(organization_id)
        .bind(&draft.location.city)
        .bind(&draft.location.state)
        .bind(&draft.location.country)
        .bind(&draft.employment_type)
        .bind(&draft.seniority_level)
        .bind(&draft.function)
        .bind(&draft.compensation_text)
        .bind(draft.posted_at)
        .bind(&draft.description)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_url(&self, external_url: &str) -> Result<Option<JobPosting>> {
        let posting = sqlx::query_as::<_, JobPosting>(
            r#"
            SELECT id, external_url, title, organization_id, city, state, country,
                   employment_type, seniority_level, function, compensation_text,
                   posted_at, description, is_active, created_at
            FROM job_postings
            WHERE external_url = ?
            "#,
        )
        .bind(external_url)
        .fetch_optional(self.pool)
        .await?;

        Ok(posting)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM job_postings")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM job_postings WHERE created_at >= ?")
            .bind(since)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
