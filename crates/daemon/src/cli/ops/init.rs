use std::path::PathBuf;

use clap::Args;

use common::builder::{EncryptionConfig, StorageStrategyConfig};
use object_store::{BucketName, ObjectStoreConfig};
use postblob_daemon::state::{AppConfig, AppState, StateError, PRIMARY_DIR_NAME};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Directory of the primary object storage (default: <config dir>/primary)
    #[arg(long)]
    pub primary_path: Option<PathBuf>,

    /// Directory of a secondary object storage; enables replication
    #[arg(long)]
    pub secondary_path: Option<PathBuf>,

    /// Suffix appended to bucket names on the secondary
    #[arg(long, default_value = "", requires = "secondary_path")]
    pub secondary_bucket_suffix: String,

    /// Store each distinct blob once
    #[arg(long)]
    pub single_save: bool,

    /// Bucket holding canonical copies under single-save
    #[arg(long, default_value = object_store::DEFAULT_BUCKET_NAME)]
    pub default_bucket: BucketName,

    /// Encrypt payloads at rest with this password
    #[arg(long, requires = "salt")]
    pub password: Option<String>,

    /// Salt for the encryption key
    #[arg(long, requires = "password")]
    pub salt: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let postblob_dir = AppState::postblob_dir(ctx.config_path.clone())?;

        let primary_path = self
            .primary_path
            .clone()
            .unwrap_or_else(|| postblob_dir.join(PRIMARY_DIR_NAME));
        let secondary = self
            .secondary_path
            .clone()
            .map(|path| ObjectStoreConfig::Local { path });
        let encryption = match (&self.password, &self.salt) {
            (Some(password), Some(salt)) => Some(EncryptionConfig {
                password: password.clone(),
                salt: salt.clone(),
            }),
            _ => None,
        };

        let config = AppConfig {
            primary: ObjectStoreConfig::Local {
                path: primary_path.clone(),
            },
            strategy: StorageStrategyConfig {
                default_bucket: self.default_bucket.clone(),
                secondary_enabled: secondary.is_some(),
                secondary_bucket_suffix: self.secondary_bucket_suffix.clone(),
                single_save: self.single_save,
                encryption,
            },
            secondary,
            ..AppConfig::default()
        };

        let state = AppState::init(Some(postblob_dir), Some(config))?;

        let secondary_str = match &self.secondary_path {
            Some(path) => path.display().to_string(),
            None => "disabled".to_string(),
        };

        let output = format!(
            "Initialized postblob directory at: {}\n\
             - Config: {}\n\
             - Registry: {}\n\
             - Repair queue: {}\n\
             - Primary storage: {}\n\
             - Secondary storage: {}\n\
             - Single-save: {}\n\
             - Encryption: {}",
            state.postblob_dir.display(),
            state.config_path.display(),
            state.registry_db_path.display(),
            state.repair_db_path.display(),
            primary_path.display(),
            secondary_str,
            state.config.strategy.single_save,
            state.config.strategy.encryption.is_some(),
        );

        Ok(output)
    }
}
