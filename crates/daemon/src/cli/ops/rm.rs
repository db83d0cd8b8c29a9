use clap::Args;

use object_store::{BlobId, BlobStoreError, BucketName};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Bucket to delete from
    pub bucket: BucketName,

    /// Blob ids to delete
    #[arg(required = true)]
    pub blob_ids: Vec<BlobId>,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("store error: {0}")]
    Store(#[from] BlobStoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let service = ctx.service().await?;

        match self.blob_ids.as_slice() {
            [blob_id] => service.store().delete(&self.bucket, blob_id).await?,
            blob_ids => service.store().delete_many(&self.bucket, blob_ids).await?,
        }

        Ok(format!(
            "removed {} blob(s) from {}",
            self.blob_ids.len(),
            self.bucket
        ))
    }
}
