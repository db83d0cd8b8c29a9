//! Error types for the blob store.

use crate::types::{BlobId, BucketName};

/// Errors that can occur when working with any layer of the blob store.
///
/// Every decorator speaks the same `BlobStoreDao` contract, so the business
/// rule violations of the upper layers live here next to the I/O failures
/// of the primitive stores.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// The requested object is absent from the store being queried
    #[error("blob not found: {bucket}/{blob_id}")]
    NotFound { bucket: BucketName, blob_id: BlobId },

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store could not be reached at all
    #[error("object storage unavailable: {0}")]
    Unavailable(String),

    #[error("invalid blob id: {0:?}")]
    InvalidBlobId(String),

    #[error("invalid bucket name: {0:?}")]
    InvalidBucketName(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before use.")]
    BucketNotFound(String),

    /// Single-save mode: this blob id has already been stored once
    #[error("blob {0} is already stored, saving the same blob id twice is not allowed")]
    DuplicateSave(BlobId),

    /// Single-save mode: the canonical bucket may not be deleted from
    #[error("cannot delete from bucket {0} while single-save is enabled")]
    ProtectedBucketDelete(BucketName),

    /// Both replicas failed the same operation
    #[error("both object storages failed: primary: {primary}; secondary: {secondary}")]
    ReplicationFailed {
        primary: Box<BlobStoreError>,
        secondary: Box<BlobStoreError>,
    },

    /// A replication gap was detected but its repair event could not be queued
    #[error("failed to publish repair event: {0}")]
    EventPublication(String),

    #[error("encryption error: {0}")]
    Encryption(String),
}

impl BlobStoreError {
    pub fn not_found(bucket: &BucketName, blob_id: &BlobId) -> Self {
        Self::NotFound {
            bucket: bucket.clone(),
            blob_id: blob_id.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, BlobStoreError>;
