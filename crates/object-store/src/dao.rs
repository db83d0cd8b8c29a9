//! The blob store capability every backend and decorator implements.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};

use crate::error::Result;
use crate::types::{BlobId, BucketName};

/// A stream of blob content chunks.
pub type BlobStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Primitive blob storage over `(bucket, blob_id) -> bytes`.
///
/// Implementations must satisfy:
/// - at most one payload per `(bucket, blob_id)`, last write wins
/// - reading an absent object fails with `BlobStoreError::NotFound`
/// - deleting an absent object or bucket succeeds
#[async_trait::async_trait]
pub trait BlobStoreDao: Send + Sync + std::fmt::Debug {
    /// Store `data` under `(bucket, blob_id)` and return the id.
    async fn save(&self, bucket: &BucketName, blob_id: &BlobId, data: Bytes) -> Result<BlobId>;

    /// Store the content of `stream` under `(bucket, blob_id)`.
    ///
    /// The default buffers the whole stream before saving.
    async fn save_stream(
        &self,
        bucket: &BucketName,
        blob_id: &BlobId,
        stream: BlobStream,
    ) -> Result<BlobId> {
        let data = collect_stream(stream).await?;
        self.save(bucket, blob_id, data).await
    }

    /// Open the content of `(bucket, blob_id)` as a stream.
    async fn read(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<BlobStream> {
        let data = self.read_bytes(bucket, blob_id).await?;
        Ok(stream::once(async move { Ok(data) }).boxed())
    }

    /// Read the full content of `(bucket, blob_id)`.
    async fn read_bytes(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<Bytes>;

    async fn delete(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<()>;

    /// Delete several blobs of one bucket.
    async fn delete_many(&self, bucket: &BucketName, blob_ids: &[BlobId]) -> Result<()> {
        for blob_id in blob_ids {
            self.delete(bucket, blob_id).await?;
        }
        Ok(())
    }

    /// Delete a bucket and everything in it.
    async fn delete_bucket(&self, bucket: &BucketName) -> Result<()>;

    async fn list_blobs(&self, bucket: &BucketName) -> Result<Vec<BlobId>>;

    async fn list_buckets(&self) -> Result<Vec<BucketName>>;
}

/// Buffer a blob stream into a single contiguous buffer.
pub async fn collect_stream(stream: BlobStream) -> Result<Bytes> {
    let buffer = stream
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}

/// Turn in-memory bytes into a single-chunk blob stream.
pub fn bytes_stream(data: Bytes) -> BlobStream {
    stream::once(async move { Ok(data) }).boxed()
}
