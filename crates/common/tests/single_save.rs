//! Store-once semantics and canonical bucket protection
mod common;

use std::sync::Arc;

use bytes::Bytes;
use crate::common::{blob, bucket};
use ::common::single_save::SingleSaveBlobStoreDao;
use ::common::testkit::PausableBlobStore;
use object_store::{BlobId, BlobIdList, BlobStoreDao, BlobStoreError, BucketName, MemoryBlobIdList};

struct Fixture {
    backend: PausableBlobStore,
    registry: Arc<MemoryBlobIdList>,
    store: SingleSaveBlobStoreDao,
}

fn fixture() -> Fixture {
    let backend = PausableBlobStore::memory("primary");
    let registry = Arc::new(MemoryBlobIdList::new());
    let store = SingleSaveBlobStoreDao::new(
        Arc::new(backend.clone()),
        registry.clone(),
        BucketName::default_bucket(),
    );
    Fixture {
        backend,
        registry,
        store,
    }
}

#[tokio::test]
async fn test_second_save_is_rejected_without_writing() {
    let f = fixture();
    let default = BucketName::default_bucket();
    let (id, data) = blob("original");

    f.store.save(&default, &id, data.clone()).await.unwrap();
    assert_eq!(f.backend.save_calls(), 1);

    let err = f
        .store
        .save(&default, &id, Bytes::from("different content"))
        .await
        .unwrap_err();

    assert!(matches!(err, BlobStoreError::DuplicateSave(ref dup) if *dup == id));
    assert_eq!(f.backend.save_calls(), 1);
    assert_eq!(f.store.read_bytes(&default, &id).await.unwrap(), data);
}

#[tokio::test]
async fn test_registered_id_is_rejected_in_any_bucket() {
    let f = fixture();
    let id = BlobId::of(b"seen elsewhere");
    f.registry.store(&id).await.unwrap();

    let err = f
        .store
        .save(&bucket("attachments"), &id, Bytes::from("seen elsewhere"))
        .await
        .unwrap_err();

    assert!(matches!(err, BlobStoreError::DuplicateSave(_)));
    assert_eq!(f.backend.save_calls(), 0);
}

#[tokio::test]
async fn test_default_bucket_deletes_are_refused() {
    let f = fixture();
    let default = BucketName::default_bucket();
    let (id, data) = blob("X");
    f.store.save(&default, &id, data).await.unwrap();

    assert!(matches!(
        f.store.delete(&default, &id).await,
        Err(BlobStoreError::ProtectedBucketDelete(_))
    ));
    // Refused regardless of registry state
    assert!(matches!(
        f.store.delete(&default, &BlobId::of(b"unknown")).await,
        Err(BlobStoreError::ProtectedBucketDelete(_))
    ));
    assert!(f
        .store
        .delete_many(&default, std::slice::from_ref(&id))
        .await
        .is_err());
    assert!(f.store.delete_bucket(&default).await.is_err());

    assert_eq!(f.backend.delete_calls(), 0);
    assert_eq!(f.store.list_blobs(&default).await.unwrap(), vec![id]);
}

#[tokio::test]
async fn test_other_bucket_deletes_are_forwarded() {
    let f = fixture();
    let other = bucket("other-bucket");
    let id = BlobId::of(b"X");
    f.backend
        .save(&other, &id, Bytes::from("X"))
        .await
        .unwrap();

    f.store.delete(&other, &id).await.unwrap();

    assert_eq!(f.backend.delete_calls(), 1);
    assert!(f.backend.list_blobs(&other).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_write_leaves_id_unregistered() {
    let f = fixture();
    let (id, data) = blob("retry me");
    f.backend.pause();

    assert!(matches!(
        f.store
            .save(&BucketName::default_bucket(), &id, data.clone())
            .await,
        Err(BlobStoreError::Unavailable(_))
    ));
    assert!(!f.registry.is_stored(&id).await.unwrap());

    f.backend.resume();
    f.store
        .save(&BucketName::default_bucket(), &id, data)
        .await
        .unwrap();
    assert!(f.registry.is_stored(&id).await.unwrap());
}
