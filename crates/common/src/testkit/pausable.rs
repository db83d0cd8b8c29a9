use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use object_store::{
    BlobId, BlobStoreDao, BlobStoreError, BlobStream, BucketName, ObjectStoreDao, Result,
};

use crate::event_bus::{DeadLetter, DispatchReport, EventBus, EventBusError, EventListener};
use crate::events::RepairEvent;

#[derive(Debug, Default)]
struct Calls {
    saves: AtomicUsize,
    reads: AtomicUsize,
    deletes: AtomicUsize,
}

/// A blob store that can be switched off and on.
#[derive(Debug, Clone)]
pub struct PausableBlobStore {
    name: &'static str,
    inner: Arc<dyn BlobStoreDao>,
    paused: Arc<AtomicBool>,
    calls: Arc<Calls>,
}

impl PausableBlobStore {
    pub fn new(name: &'static str, inner: Arc<dyn BlobStoreDao>) -> Self {
        Self {
            name,
            inner,
            paused: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Calls::default()),
        }
    }

    /// Wrap a fresh in-memory object storage.
    pub fn memory(name: &'static str) -> Self {
        Self::new(name, Arc::new(ObjectStoreDao::memory()))
    }

    pub fn pause(&self) {
        tracing::debug!(store = self.name, "paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        tracing::debug!(store = self.name, "resumed");
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Save attempts, including the ones rejected while paused.
    pub fn save_calls(&self) -> usize {
        self.calls.saves.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.calls.reads.load(Ordering::SeqCst)
    }

    /// Delete attempts of any kind.
    pub fn delete_calls(&self) -> usize {
        self.calls.deletes.load(Ordering::SeqCst)
    }

    /// The wrapped store, reachable even while paused.
    pub fn backend(&self) -> &Arc<dyn BlobStoreDao> {
        &self.inner
    }

    fn check(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.is_paused() {
            return Err(BlobStoreError::Unavailable(format!(
                "{} object storage is paused",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStoreDao for PausableBlobStore {
    async fn save(&self, bucket: &BucketName, blob_id: &BlobId, data: Bytes) -> Result<BlobId> {
        self.check(&self.calls.saves)?;
        self.inner.save(bucket, blob_id, data).await
    }

    async fn save_stream(
        &self,
        bucket: &BucketName,
        blob_id: &BlobId,
        stream: BlobStream,
    ) -> Result<BlobId> {
        self.check(&self.calls.saves)?;
        self.inner.save_stream(bucket, blob_id, stream).await
    }

    async fn read(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<BlobStream> {
        self.check(&self.calls.reads)?;
        self.inner.read(bucket, blob_id).await
    }

    async fn read_bytes(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<Bytes> {
        self.check(&self.calls.reads)?;
        self.inner.read_bytes(bucket, blob_id).await
    }

    async fn delete(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<()> {
        self.check(&self.calls.deletes)?;
        self.inner.delete(bucket, blob_id).await
    }

    async fn delete_many(&self, bucket: &BucketName, blob_ids: &[BlobId]) -> Result<()> {
        self.check(&self.calls.deletes)?;
        self.inner.delete_many(bucket, blob_ids).await
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<()> {
        self.check(&self.calls.deletes)?;
        self.inner.delete_bucket(bucket).await
    }

    async fn list_blobs(&self, bucket: &BucketName) -> Result<Vec<BlobId>> {
        self.check(&self.calls.reads)?;
        self.inner.list_blobs(bucket).await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        self.check(&self.calls.reads)?;
        self.inner.list_buckets().await
    }
}

/// An event bus whose backend is down: every call fails.
#[derive(Debug, Default)]
pub struct UnavailableEventBus;

impl UnavailableEventBus {
    fn error() -> EventBusError {
        EventBusError::Backend("event bus backend is unreachable".into())
    }
}

#[async_trait::async_trait]
impl EventBus for UnavailableEventBus {
    async fn publish(&self, _event: RepairEvent) -> std::result::Result<(), EventBusError> {
        Err(Self::error())
    }

    async fn dispatch_pending(
        &self,
        _listener: &dyn EventListener,
    ) -> std::result::Result<DispatchReport, EventBusError> {
        Err(Self::error())
    }

    async fn pending_count(&self) -> std::result::Result<usize, EventBusError> {
        Err(Self::error())
    }

    async fn dead_letters(&self) -> std::result::Result<Vec<DeadLetter>, EventBusError> {
        Err(Self::error())
    }
}
