//! Single-copy deduplication guard.

use std::sync::Arc;

use bytes::Bytes;
use object_store::{
    BlobId, BlobIdList, BlobStoreDao, BlobStoreError, BlobStream, BucketName, Result,
};

/// Stores each distinct blob id once, keeping the default bucket as its
/// canonical location.
///
/// Saving an id already in the registry fails with
/// `BlobStoreError::DuplicateSave` and never reaches the wrapped store;
/// callers treat that error as "already present". Deleting from the default
/// bucket fails with `BlobStoreError::ProtectedBucketDelete`, since other
/// logical references may still point at the single physical copy.
///
/// The registry check and the save are not transactional: two concurrent
/// first saves of one id may both write, which costs a redundant write and
/// nothing else.
#[derive(Debug, Clone)]
pub struct SingleSaveBlobStoreDao {
    inner: Arc<dyn BlobStoreDao>,
    registry: Arc<dyn BlobIdList>,
    default_bucket: BucketName,
}

impl SingleSaveBlobStoreDao {
    pub fn new(
        inner: Arc<dyn BlobStoreDao>,
        registry: Arc<dyn BlobIdList>,
        default_bucket: BucketName,
    ) -> Self {
        Self {
            inner,
            registry,
            default_bucket,
        }
    }

    pub fn default_bucket(&self) -> &BucketName {
        &self.default_bucket
    }

    async fn ensure_not_stored(&self, blob_id: &BlobId) -> Result<()> {
        if self.registry.is_stored(blob_id).await? {
            tracing::debug!(%blob_id, "rejecting duplicate save");
            return Err(BlobStoreError::DuplicateSave(blob_id.clone()));
        }
        Ok(())
    }

    fn ensure_deletable(&self, bucket: &BucketName) -> Result<()> {
        if *bucket == self.default_bucket {
            return Err(BlobStoreError::ProtectedBucketDelete(bucket.clone()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStoreDao for SingleSaveBlobStoreDao {
    async fn save(&self, bucket: &BucketName, blob_id: &BlobId, data: Bytes) -> Result<BlobId> {
        self.ensure_not_stored(blob_id).await?;
        let saved = self.inner.save(bucket, blob_id, data).await?;
        self.registry.store(blob_id).await?;
        Ok(saved)
    }

    async fn save_stream(
        &self,
        bucket: &BucketName,
        blob_id: &BlobId,
        stream: BlobStream,
    ) -> Result<BlobId> {
        self.ensure_not_stored(blob_id).await?;
        let saved = self.inner.save_stream(bucket, blob_id, stream).await?;
        self.registry.store(blob_id).await?;
        Ok(saved)
    }

    async fn read(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<BlobStream> {
        self.inner.read(bucket, blob_id).await
    }

    async fn read_bytes(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<Bytes> {
        self.inner.read_bytes(bucket, blob_id).await
    }

    async fn delete(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<()> {
        self.ensure_deletable(bucket)?;
        self.inner.delete(bucket, blob_id).await
    }

    async fn delete_many(&self, bucket: &BucketName, blob_ids: &[BlobId]) -> Result<()> {
        self.ensure_deletable(bucket)?;
        self.inner.delete_many(bucket, blob_ids).await
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<()> {
        self.ensure_deletable(bucket)?;
        self.inner.delete_bucket(bucket).await
    }

    async fn list_blobs(&self, bucket: &BucketName) -> Result<Vec<BlobId>> {
        self.inner.list_blobs(bucket).await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        self.inner.list_buckets().await
    }
}
