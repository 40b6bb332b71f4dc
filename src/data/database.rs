//! SQLite database operations
//!
//! All post persistence goes through this module.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::repository::PostRepository;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::from(e)
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }
}

#[async_trait]
impl PostRepository for Database {
    async fn upsert_many(&self, records: &[SourcePost]) -> Result<u64, AppError> {
        if records.is_empty() {
            return Ok(0);
        }

        // One timestamp per batch; within a batch, insertion order breaks ties
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO posts (external_id, title, body, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(external_id) DO UPDATE SET
                    title = excluded.title,
                    body = excluded.body,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(record.id)
            .bind(&record.title)
            .bind(&record.body)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }

        tx.commit().await?;

        tracing::debug!(written, "Upserted posts");
        Ok(written)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        crate::metrics::POSTS_TOTAL.set(count);
        Ok(count)
    }

    async fn list_recent(&self, page_size: u32, page_number: u32) -> Result<PostPage, AppError> {
        let page_size = page_size.max(1);
        let page = page_number.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;

        Ok(PostPage {
            posts,
            total,
            page,
            page_size,
        })
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }
}
