use clap::Args;

use object_store::{BlobStoreError, BucketName};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Bucket to list; lists buckets when omitted
    pub bucket: Option<BucketName>,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("store error: {0}")]
    Store(#[from] BlobStoreError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let service = ctx.service().await?;

        // Replicated stores list their primary only
        let entries: Vec<String> = match &self.bucket {
            Some(bucket) => service
                .store()
                .list_blobs(bucket)
                .await?
                .iter()
                .map(ToString::to_string)
                .collect(),
            None => service
                .store()
                .list_buckets()
                .await?
                .iter()
                .map(ToString::to_string)
                .collect(),
        };

        if entries.is_empty() {
            Ok("No items found".to_string())
        } else {
            Ok(entries.join("\n"))
        }
    }
}
