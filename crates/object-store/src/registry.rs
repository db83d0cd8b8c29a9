//! Registry of blob ids that have ever been stored.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::BlobId;

/// Persisted, append-only set of stored blob ids.
///
/// Entries are bucket independent and are never removed through this
/// interface; retention of the canonical copies is owned elsewhere.
#[async_trait::async_trait]
pub trait BlobIdList: Send + Sync + std::fmt::Debug {
    async fn is_stored(&self, blob_id: &BlobId) -> Result<bool>;

    /// Record `blob_id`. Recording an id twice is a no-op.
    async fn store(&self, blob_id: &BlobId) -> Result<()>;
}

/// In-memory registry, for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryBlobIdList {
    ids: RwLock<HashSet<BlobId>>,
}

impl MemoryBlobIdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[async_trait::async_trait]
impl BlobIdList for MemoryBlobIdList {
    async fn is_stored(&self, blob_id: &BlobId) -> Result<bool> {
        Ok(self.ids.read().contains(blob_id))
    }

    async fn store(&self, blob_id: &BlobId) -> Result<()> {
        self.ids.write().insert(blob_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_blob_id_list() {
        let list = MemoryBlobIdList::new();
        let id = BlobId::of(b"message body");

        assert!(!list.is_stored(&id).await.unwrap());

        list.store(&id).await.unwrap();
        list.store(&id).await.unwrap();

        assert!(list.is_stored(&id).await.unwrap());
        assert_eq!(list.len(), 1);
    }
}
