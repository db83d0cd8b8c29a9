//! Object storage backend (S3/MinIO/local filesystem/memory) implementing `BlobStoreDao`.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::dao::{BlobStoreDao, BlobStream};
use crate::error::{BlobStoreError, Result};
use crate::types::{BlobId, BucketName};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// A `BlobStoreDao` over a single object store.
///
/// Logical buckets are top-level prefixes: `(bucket, blob_id)` lives at
/// `<bucket>/<blob_id>`. Against S3 every logical bucket shares the one
/// physical bucket named in the configuration.
#[derive(Debug, Clone)]
pub struct ObjectStoreDao {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreDao {
    /// Create a new storage backend from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                );

                // Listing the empty prefix fails fast if the bucket doesn't exist
                {
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        Ok(Self { inner })
    }

    /// Create an in-memory backend.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    /// Wrap an already-built object store.
    pub fn from_object_store(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    fn bucket_path(bucket: &BucketName) -> ObjectPath {
        ObjectPath::from_iter([bucket.as_str()])
    }

    fn blob_path(bucket: &BucketName, blob_id: &BlobId) -> ObjectPath {
        ObjectPath::from_iter([bucket.as_str(), blob_id.as_str()])
    }

    /// Delete one object, treating an absent object as already deleted.
    async fn delete_path(&self, path: &ObjectPath) -> Result<()> {
        match self.inner.delete(path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn map_read_error(e: object_store::Error, bucket: &BucketName, blob_id: &BlobId) -> BlobStoreError {
        match e {
            object_store::Error::NotFound { .. } => BlobStoreError::not_found(bucket, blob_id),
            e => e.into(),
        }
    }
}

#[async_trait::async_trait]
impl BlobStoreDao for ObjectStoreDao {
    async fn save(&self, bucket: &BucketName, blob_id: &BlobId, data: Bytes) -> Result<BlobId> {
        let path = Self::blob_path(bucket, blob_id);
        let size = data.len();
        self.inner.put(&path, data.into()).await?;
        tracing::debug!(%bucket, %blob_id, size, "blob saved");
        Ok(blob_id.clone())
    }

    async fn read(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<BlobStream> {
        let path = Self::blob_path(bucket, blob_id);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::map_read_error(e, bucket, blob_id))?;
        Ok(result
            .into_stream()
            .map_err(|e| std::io::Error::other(e.to_string()))
            .boxed())
    }

    async fn read_bytes(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<Bytes> {
        let path = Self::blob_path(bucket, blob_id);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::map_read_error(e, bucket, blob_id))?;
        result
            .bytes()
            .await
            .map_err(|e| Self::map_read_error(e, bucket, blob_id))
    }

    async fn delete(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<()> {
        self.delete_path(&Self::blob_path(bucket, blob_id)).await?;
        tracing::debug!(%bucket, %blob_id, "blob deleted");
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<()> {
        let prefix = Self::bucket_path(bucket);
        let locations: Vec<ObjectPath> = self
            .inner
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;

        for location in &locations {
            self.delete_path(location).await?;
        }

        tracing::debug!(%bucket, objects = locations.len(), "bucket deleted");
        Ok(())
    }

    async fn list_blobs(&self, bucket: &BucketName) -> Result<Vec<BlobId>> {
        let prefix = Self::bucket_path(bucket);
        let items: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;

        let mut ids = Vec::with_capacity(items.len());
        for meta in items {
            match meta.location.filename().map(BlobId::parse) {
                Some(Ok(id)) => ids.push(id),
                _ => {
                    tracing::warn!(location = %meta.location, "unexpected object in bucket, skipping");
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        let listing = self.inner.list_with_delimiter(None).await?;

        let mut buckets = Vec::with_capacity(listing.common_prefixes.len());
        for prefix in &listing.common_prefixes {
            let Some(bucket) = prefix
                .filename()
                .and_then(|name| BucketName::new(name).ok())
            else {
                continue;
            };
            // Local directories outlive their last object
            if self.inner.list(Some(prefix)).try_next().await?.is_none() {
                continue;
            }
            buckets.push(bucket);
        }
        buckets.sort();
        Ok(buckets)
    }
}
