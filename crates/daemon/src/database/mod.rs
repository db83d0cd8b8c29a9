mod event_bus;
mod sqlite;

use std::ops::Deref;
use std::path::Path;

use sqlx::SqlitePool;

pub use event_bus::SqliteEventBus;

#[derive(Clone, Debug)]
pub struct Database(SqlitePool);

impl Database {
    /// Open (or create) the database file at `path` and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self, DatabaseSetupError> {
        let db = sqlite::connect_sqlite(path).await?;
        sqlite::migrate_sqlite(&db).await?;
        Ok(Database::new(db))
    }

    /// A private in-memory database, gone once dropped.
    pub async fn in_memory() -> Result<Self, DatabaseSetupError> {
        let db = sqlite::connect_sqlite_memory().await?;
        sqlite::migrate_sqlite(&db).await?;
        Ok(Database::new(db))
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self(pool)
    }
}

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("error occurred while attempting database migration: {0}")]
    MigrationFailed(sqlx::migrate::MigrateError),

    #[error("unable to perform initial connection and check of the database: {0}")]
    Unavailable(sqlx::Error),

    #[error("unable to prepare the database directory: {0}")]
    Io(#[from] std::io::Error),
}
