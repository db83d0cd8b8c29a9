use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;

use object_store::{BlobId, BlobStoreError, BucketName};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Bucket to store into
    pub bucket: BucketName,

    /// File to store
    pub file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store error: {0}")]
    Store(#[from] BlobStoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Put {
    type Error = PutError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let service = ctx.service().await?;

        let data = tokio::fs::read(&self.file)
            .await
            .map_err(|source| PutError::Read {
                path: self.file.clone(),
                source,
            })?;
        let blob_id = BlobId::of(&data);

        match service
            .store()
            .save(&self.bucket, &blob_id, Bytes::from(data))
            .await
        {
            Ok(saved) => Ok(saved.to_string()),
            // Single-save reports content it already holds
            Err(BlobStoreError::DuplicateSave(existing)) => {
                Ok(format!("{} (already stored)", existing))
            }
            Err(e) => Err(e.into()),
        }
    }
}
