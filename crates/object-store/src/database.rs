//! SQLite-backed blob id registry.

use std::path::Path;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Row,
};

use crate::error::Result;
use crate::registry::BlobIdList;
use crate::types::BlobId;

/// `BlobIdList` persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteBlobIdList {
    pool: SqlitePool,
}

impl SqliteBlobIdList {
    /// Open (or create) the registry database at `path`.
    pub async fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory registry.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal);

        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Count registered ids.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM blob_id_list
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }
}

#[async_trait::async_trait]
impl BlobIdList for SqliteBlobIdList {
    async fn is_stored(&self, blob_id: &BlobId) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM blob_id_list WHERE blob_id = ?
            "#,
        )
        .bind(blob_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn store(&self, blob_id: &BlobId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO blob_id_list (blob_id, created_at)
            VALUES (?, ?)
            ON CONFLICT(blob_id) DO NOTHING
            "#,
        )
        .bind(blob_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
