//! Shared fixtures for the replication and repair integration tests
#![allow(dead_code)]

use std::sync::Arc;

use ::common::event_bus::{InMemoryEventBus, RetryPolicy};
use ::common::repair::FailedBlobOperationListener;
use ::common::replication::{SecondaryBlobStoreDao, SecondaryBucketMapping};
use ::common::testkit::PausableBlobStore;
use object_store::{BlobId, BucketName};

pub const SECONDARY_SUFFIX: &str = "-replica";

/// A replicated store over two pausable in-memory replicas.
pub struct ReplicatedFixture {
    pub primary: PausableBlobStore,
    pub secondary: PausableBlobStore,
    pub bus: Arc<InMemoryEventBus>,
    pub store: SecondaryBlobStoreDao,
    pub listener: FailedBlobOperationListener,
}

impl ReplicatedFixture {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::immediate(5))
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        let primary = PausableBlobStore::memory("primary");
        let secondary = PausableBlobStore::memory("secondary");
        let mapping = SecondaryBucketMapping::new(SECONDARY_SUFFIX).unwrap();
        let bus = Arc::new(InMemoryEventBus::new(policy));

        let store = SecondaryBlobStoreDao::new(
            Arc::new(primary.clone()),
            Arc::new(secondary.clone()),
            mapping.clone(),
            bus.clone(),
        );
        let listener = FailedBlobOperationListener::new(
            Arc::new(primary.clone()),
            Arc::new(secondary.clone()),
            mapping,
        );

        Self {
            primary,
            secondary,
            bus,
            store,
            listener,
        }
    }
}

pub fn bucket(name: &str) -> BucketName {
    BucketName::new(name).unwrap()
}

/// Name of `name` on the secondary replica.
pub fn secondary_bucket(name: &str) -> BucketName {
    BucketName::new(format!("{}{}", name, SECONDARY_SUFFIX)).unwrap()
}

pub fn blob(data: &'static str) -> (BlobId, bytes::Bytes) {
    (BlobId::of(data.as_bytes()), bytes::Bytes::from(data))
}

/// Route library logs to the test output, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
