//! Encryption at rest for blob payloads.

mod secret;

use std::sync::Arc;

use bytes::Bytes;
use object_store::{BlobId, BlobStoreDao, BlobStoreError, BucketName, Result};

pub use secret::{Secret, SecretError, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};

/// Encrypts payloads before they reach the wrapped store and decrypts them on read.
///
/// Blob ids are derived by callers from plaintext and pass through untouched,
/// as do deletes and listings.
#[derive(Debug, Clone)]
pub struct EncryptedBlobStoreDao {
    inner: Arc<dyn BlobStoreDao>,
    secret: Secret,
}

impl EncryptedBlobStoreDao {
    pub fn new(inner: Arc<dyn BlobStoreDao>, secret: Secret) -> Self {
        Self { inner, secret }
    }
}

impl From<SecretError> for BlobStoreError {
    fn from(e: SecretError) -> Self {
        BlobStoreError::Encryption(e.to_string())
    }
}

#[async_trait::async_trait]
impl BlobStoreDao for EncryptedBlobStoreDao {
    async fn save(&self, bucket: &BucketName, blob_id: &BlobId, data: Bytes) -> Result<BlobId> {
        let ciphertext = self.secret.encrypt(&data)?;
        self.inner
            .save(bucket, blob_id, Bytes::from(ciphertext))
            .await
    }

    async fn read_bytes(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<Bytes> {
        let ciphertext = self.inner.read_bytes(bucket, blob_id).await?;
        let plaintext = self.secret.decrypt(&ciphertext)?;
        Ok(Bytes::from(plaintext))
    }

    async fn delete(&self, bucket: &BucketName, blob_id: &BlobId) -> Result<()> {
        self.inner.delete(bucket, blob_id).await
    }

    async fn delete_many(&self, bucket: &BucketName, blob_ids: &[BlobId]) -> Result<()> {
        self.inner.delete_many(bucket, blob_ids).await
    }

    async fn delete_bucket(&self, bucket: &BucketName) -> Result<()> {
        self.inner.delete_bucket(bucket).await
    }

    async fn list_blobs(&self, bucket: &BucketName) -> Result<Vec<BlobId>> {
        self.inner.list_blobs(bucket).await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        self.inner.list_buckets().await
    }
}

#[cfg(test)]
mod tests {
    use object_store::ObjectStoreDao;

    use super::*;

    #[tokio::test]
    async fn test_payload_is_encrypted_at_rest() {
        let backend = Arc::new(ObjectStoreDao::memory());
        let store = EncryptedBlobStoreDao::new(backend.clone(), Secret::derive("pw", "salt"));
        let bucket = BucketName::new("messages").unwrap();
        let data = Bytes::from("Subject: quarterly numbers");
        let id = BlobId::of(&data);

        store.save(&bucket, &id, data.clone()).await.unwrap();

        let at_rest = backend.read_bytes(&bucket, &id).await.unwrap();
        assert_ne!(at_rest, data);
        assert_eq!(store.read_bytes(&bucket, &id).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_wrong_password_cannot_read() {
        let backend = Arc::new(ObjectStoreDao::memory());
        let bucket = BucketName::new("messages").unwrap();
        let id = BlobId::of(b"secret");

        EncryptedBlobStoreDao::new(backend.clone(), Secret::derive("pw", "salt"))
            .save(&bucket, &id, Bytes::from("secret"))
            .await
            .unwrap();

        let err = EncryptedBlobStoreDao::new(backend, Secret::derive("other", "salt"))
            .read_bytes(&bucket, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, BlobStoreError::Encryption(_)));
    }
}
