//! Repair worker replaying failed replica operations.
//!
//! The worker is stateless: every delivery gets a single attempt, and
//! redelivery, backoff and dead-lettering belong to the event bus. All
//! replays are idempotent, so duplicate deliveries or several workers on
//! the same stream are harmless.

use std::sync::Arc;

use object_store::{BlobStoreDao, BlobStoreError, BucketName};

use crate::event_bus::EventListener;
use crate::events::{ObjectStorageIdentity, RepairEvent};
use crate::replication::SecondaryBucketMapping;

/// Listener group name of the repair worker.
pub const REPAIR_GROUP: &str = "failed-blob-operations";

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// The replica expected to hold the content could not provide it
    #[error("cannot read {bucket} from surviving {replica} object storage: {cause}")]
    ReadSurvivor {
        replica: ObjectStorageIdentity,
        bucket: BucketName,
        #[source]
        cause: BlobStoreError,
    },

    /// The failed replica rejected the replayed operation
    #[error("cannot replay {kind} on {replica} object storage: {cause}")]
    Replay {
        kind: &'static str,
        replica: ObjectStorageIdentity,
        #[source]
        cause: BlobStoreError,
    },
}

/// Consumes repair events and re-applies them to the replica that missed them.
#[derive(Debug, Clone)]
pub struct FailedBlobOperationListener {
    primary: Arc<dyn BlobStoreDao>,
    secondary: Arc<dyn BlobStoreDao>,
    mapping: SecondaryBucketMapping,
}

impl FailedBlobOperationListener {
    pub fn new(
        primary: Arc<dyn BlobStoreDao>,
        secondary: Arc<dyn BlobStoreDao>,
        mapping: SecondaryBucketMapping,
    ) -> Self {
        Self {
            primary,
            secondary,
            mapping,
        }
    }

    fn store(&self, replica: ObjectStorageIdentity) -> &Arc<dyn BlobStoreDao> {
        match replica {
            ObjectStorageIdentity::Primary => &self.primary,
            ObjectStorageIdentity::Secondary => &self.secondary,
        }
    }

    /// Name of `bucket` on `replica`.
    fn bucket_on(&self, replica: ObjectStorageIdentity, bucket: &BucketName) -> BucketName {
        match replica {
            ObjectStorageIdentity::Primary => bucket.clone(),
            ObjectStorageIdentity::Secondary => self.mapping.to_secondary(bucket),
        }
    }

    /// Replay the operation described by `event` on its failed replica.
    pub async fn repair(&self, event: &RepairEvent) -> Result<(), RepairError> {
        let failed = event.failed_object_storage();
        let target_bucket = self.bucket_on(failed, event.bucket_name());
        let target = self.store(failed);

        match event {
            RepairEvent::BlobAddition {
                bucket_name,
                blob_id,
                ..
            } => {
                let survivor = failed.other();
                let source_bucket = self.bucket_on(survivor, bucket_name);
                let data = self
                    .store(survivor)
                    .read_bytes(&source_bucket, blob_id)
                    .await
                    .map_err(|cause| RepairError::ReadSurvivor {
                        replica: survivor,
                        bucket: source_bucket.clone(),
                        cause,
                    })?;

                target
                    .save(&target_bucket, blob_id, data)
                    .await
                    .map_err(|cause| RepairError::Replay {
                        kind: event.kind(),
                        replica: failed,
                        cause,
                    })?;
            }
            RepairEvent::BlobsDeletion { blob_ids, .. } => {
                target
                    .delete_many(&target_bucket, blob_ids)
                    .await
                    .map_err(|cause| RepairError::Replay {
                        kind: event.kind(),
                        replica: failed,
                        cause,
                    })?;
            }
            RepairEvent::BucketDeletion { .. } => {
                target
                    .delete_bucket(&target_bucket)
                    .await
                    .map_err(|cause| RepairError::Replay {
                        kind: event.kind(),
                        replica: failed,
                        cause,
                    })?;
            }
        }

        tracing::info!(
            event_id = %event.event_id(),
            kind = event.kind(),
            bucket = %target_bucket,
            %failed,
            "replica repaired"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventListener for FailedBlobOperationListener {
    fn name(&self) -> &str {
        REPAIR_GROUP
    }

    async fn handle(&self, event: &RepairEvent) -> anyhow::Result<()> {
        self.repair(event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use object_store::{BlobId, ObjectStoreDao};

    use super::*;

    struct Fixture {
        primary: Arc<ObjectStoreDao>,
        secondary: Arc<ObjectStoreDao>,
        listener: FailedBlobOperationListener,
    }

    fn fixture() -> Fixture {
        let primary = Arc::new(ObjectStoreDao::memory());
        let secondary = Arc::new(ObjectStoreDao::memory());
        let listener = FailedBlobOperationListener::new(
            primary.clone(),
            secondary.clone(),
            SecondaryBucketMapping::new("-replica").unwrap(),
        );
        Fixture {
            primary,
            secondary,
            listener,
        }
    }

    #[tokio::test]
    async fn test_addition_copies_from_secondary_to_primary() {
        let f = fixture();
        let bucket = BucketName::new("messages").unwrap();
        let mapped = BucketName::new("messages-replica").unwrap();
        let id = BlobId::of(b"body");

        f.secondary
            .save(&mapped, &id, Bytes::from("body"))
            .await
            .unwrap();

        let event = RepairEvent::blob_addition(&bucket, &id, ObjectStorageIdentity::Primary);
        f.listener.repair(&event).await.unwrap();

        assert_eq!(
            f.primary.read_bytes(&bucket, &id).await.unwrap(),
            Bytes::from("body")
        );
    }

    #[tokio::test]
    async fn test_addition_without_survivor_copy_fails() {
        let f = fixture();
        let bucket = BucketName::new("messages").unwrap();
        let id = BlobId::of(b"lost");

        let event = RepairEvent::blob_addition(&bucket, &id, ObjectStorageIdentity::Secondary);
        let err = f.listener.repair(&event).await.unwrap_err();

        match err {
            RepairError::ReadSurvivor { replica, cause, .. } => {
                assert_eq!(replica, ObjectStorageIdentity::Primary);
                assert!(cause.is_not_found());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_bucket_deletion_targets_mapped_bucket() {
        let f = fixture();
        let bucket = BucketName::new("messages").unwrap();
        let mapped = BucketName::new("messages-replica").unwrap();
        let id = BlobId::of(b"body");

        f.secondary
            .save(&mapped, &id, Bytes::from("body"))
            .await
            .unwrap();

        let event = RepairEvent::bucket_deletion(&bucket, ObjectStorageIdentity::Secondary);
        f.listener.repair(&event).await.unwrap();

        assert!(f.secondary.list_blobs(&mapped).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listener_group_and_event_username() {
        let f = fixture();
        let event = RepairEvent::bucket_deletion(
            &BucketName::new("messages").unwrap(),
            ObjectStorageIdentity::Primary,
        );

        assert_eq!(f.listener.name(), "failed-blob-operations");
        assert!(event.to_json().unwrap().contains("\"blob-replication\""));
    }
}
