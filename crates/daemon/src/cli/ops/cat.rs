use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use object_store::{BlobId, BlobStoreError, BucketName};

use crate::cli::op::ContextError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Bucket to read from
    pub bucket: BucketName,

    /// Blob id, as printed by `put`
    pub blob_id: BlobId,

    /// Write the blob to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("store error: {0}")]
    Store(#[from] BlobStoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let service = ctx.service().await?;
        let mut stream = service.store().read(&self.bucket, &self.blob_id).await?;

        let mut written = 0usize;
        match &self.output {
            Some(path) => {
                let mut file = tokio::fs::File::create(path).await?;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    written += chunk.len();
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                Ok(format!("wrote {} bytes to {}", written, path.display()))
            }
            None => {
                let mut stdout = tokio::io::stdout();
                while let Some(chunk) = stream.next().await {
                    stdout.write_all(&chunk?).await?;
                }
                stdout.flush().await?;
                Ok(String::new())
            }
        }
    }
}
