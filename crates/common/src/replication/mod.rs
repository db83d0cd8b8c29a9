//! Dual-region replication over two object storages.
//!
//! Writes and deletes go to both replicas concurrently and succeed as long as
//! one replica applied them; the other replica's gap is handed to the event
//! bus as a `RepairEvent` and closed later by the repair worker. Reads try the
//! primary first and fall back to the secondary.

mod mapping;
mod outcome;

use std::sync::Arc;

use bytes::Bytes;
use object_store::{
    collect_stream, BlobId, BlobStoreDao, BlobStoreError, BlobStream, BucketName, Result,
};

use crate::event_bus::EventBus;
use crate::events::{ObjectStorageIdentity, RepairEvent};

pub use mapping::SecondaryBucketMapping;
pub use outcome::ReplicationOutcome;

/// A `BlobStoreDao` backed by a primary and a secondary object storage.
#[derive(Debug, Clone)]
pub struct SecondaryBlobStoreDao {
    primary: Arc<dyn BlobStoreDao>,
    secondary: Arc<dyn BlobStoreDao>,
    mapping: SecondaryBucketMapping,
    event_bus: Arc<dyn EventBus>,
}

impl SecondaryBlobStoreDao {
    pub fn new(
        primary: Arc<dyn BlobStoreDao>,
        secondary: Arc<dyn BlobStoreDao>,
        mapping: SecondaryBucketMapping,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            primary,
            secondary,
            mapping,
            event_bus,
        }
    }

    pub fn mapping(&self) -> &SecondaryBucketMapping {
        &self.mapping
    }

    /// Turn the joined outcome of a dual operation into the caller's result.
    ///
    /// A degraded outcome publishes exactly one repair event built by
    /// `repair_event`; a total failure publishes nothing.
    async fn settle(
        &self,
        operation: &'static str,
        bucket: &BucketName,
        outcome: ReplicationOutcome,
        repair_event: impl FnOnce(ObjectStorageIdentity) -> RepairEvent,
    ) -> Result<()> {
        match outcome {
            ReplicationOutcome::Replicated => Ok(()),
            ReplicationOutcome::Degraded { failed, cause } => {
                let event = repair_event(failed);
                tracing::warn!(
                    operation,
                    %bucket,
                    %failed,
                    event_id = %event.event_id(),
                    "replication degraded, scheduling repair: {}",
                    cause
                );
                self.event_bus
                    .publish(event)
                    .await
                    .map_err(|e| BlobStoreError::EventPublication(e.to_string()))
            }
            ReplicationOutcome::Failed { primary, secondary } => {
                tracing::error!(
                    operation,
                    %bucket,
                    "both object storages failed: primary: {}; secondary: {}",
                    primary,
                    secondary
                );
                Err(BlobStoreError::ReplicationFailed {
                    primary: Box::new(primary),
                    secondary: Box::new(secondary),
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl BlobStoreDao for SecondaryBlobStoreDao {
    async fn save(&self, bucket: &BucketName, blob_id: &BlobId, data: Bytes) -> Result<BlobId> {
        let secondary_bucket = self.mapping.to_secondary(bucket);
        let (primary, secondary) = tokio::join!(
            self.primary.save(bucket, blob_id, data.clone()),
            self.secondary.save(&secondary_bucket, blob_id, data),
        );

        let outcome = ReplicationOutcome::from_results(primary, secondary);
        self.settle("save", bucket, outcome, |failed| {
            RepairEvent::blob_addition(bucket, blob_id, failed)
        })
        .await?;
        Ok(blob_id.clone())
    }

    async fn save_stream(
        &self,
        bucket: &BucketName,
        blob_id: &BlobId,
        stream: BlobStream,
    ) -> Result<BlobId> {
        // Both replicas need the same bytes, so the stream is consumed once
        let data = collect_stream(stream).await?;
        self.save(bucket, blob_id, data).await
    }

    async fn read(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<BlobStream> {
        match self.primary.read(bucket, blob_id).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                tracing::debug!(%bucket, %blob_id, "primary read failed, falling back to secondary: {}", e);
                self.secondary
                    .read(&self.mapping.to_secondary(bucket), blob_id)
                    .await
            }
        }
    }

    async fn read_bytes(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<Bytes> {
        match self.primary.read_bytes(bucket, blob_id).await {
            Ok(data) => Ok(data),
            Err(e) => {
                tracing::debug!(%bucket, %blob_id, "primary read failed, falling back to secondary: {}", e);
                self.secondary
                    .read_bytes(&self.mapping.to_secondary(bucket), blob_id)
                    .await
            }
        }
    }

    async fn delete(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<()> {
        self.delete_many(bucket, std::slice::from_ref(blob_id)).await
    }

    async fn delete_many(&self, bucket: &BucketName, blob_ids: &[BlobId]) -> Result<()> {
        let secondary_bucket = self.mapping.to_secondary(bucket);
        let (primary, secondary) = tokio::join!(
            self.primary.delete_many(bucket, blob_ids),
            self.secondary.delete_many(&secondary_bucket, blob_ids),
        );

        let outcome = ReplicationOutcome::from_results(primary, secondary);
        self.settle("delete", bucket, outcome, |failed| {
            RepairEvent::blobs_deletion(bucket, blob_ids, failed)
        })
        .await
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<()> {
        let secondary_bucket = self.mapping.to_secondary(bucket);
        let (primary, secondary) = tokio::join!(
            self.primary.delete_bucket(bucket),
            self.secondary.delete_bucket(&secondary_bucket),
        );

        let outcome = ReplicationOutcome::from_results(primary, secondary);
        self.settle("delete_bucket", bucket, outcome, |failed| {
            RepairEvent::bucket_deletion(bucket, failed)
        })
        .await
    }

    /// Lists the primary replica only.
    async fn list_blobs(&self, bucket: &BucketName) -> Result<Vec<BlobId>> {
        self.primary.list_blobs(bucket).await
    }

    /// Lists the primary replica only.
    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        self.primary.list_buckets().await
    }
}

#[cfg(test)]
mod tests {
    use object_store::ObjectStoreDao;

    use super::*;
    use crate::event_bus::InMemoryEventBus;

    #[tokio::test]
    async fn test_secondary_uses_mapped_bucket() {
        let primary = Arc::new(ObjectStoreDao::memory());
        let secondary = Arc::new(ObjectStoreDao::memory());
        let store = SecondaryBlobStoreDao::new(
            primary.clone(),
            secondary.clone(),
            SecondaryBucketMapping::new("-replica").unwrap(),
            Arc::new(InMemoryEventBus::default()),
        );
        let bucket = BucketName::new("messages").unwrap();
        let id = BlobId::of(b"hello");

        store.save(&bucket, &id, Bytes::from("hello")).await.unwrap();

        assert_eq!(primary.list_blobs(&bucket).await.unwrap(), vec![id.clone()]);
        assert!(secondary.list_blobs(&bucket).await.unwrap().is_empty());
        assert_eq!(
            secondary
                .list_blobs(&BucketName::new("messages-replica").unwrap())
                .await
                .unwrap(),
            vec![id]
        );
    }
}
