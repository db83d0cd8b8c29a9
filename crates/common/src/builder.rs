//! Composition of the blob store decorator chain from resolved configuration.

use std::sync::Arc;

use object_store::{BlobIdList, BlobStoreDao, BucketName};
use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptedBlobStoreDao, Secret};
use crate::event_bus::EventBus;
use crate::repair::FailedBlobOperationListener;
use crate::replication::{SecondaryBlobStoreDao, SecondaryBucketMapping};
use crate::single_save::SingleSaveBlobStoreDao;

/// Storage strategy switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStrategyConfig {
    /// Bucket holding canonical copies under single-save mode
    #[serde(default)]
    pub default_bucket: BucketName,
    /// Replicate every write to a secondary object storage
    #[serde(default)]
    pub secondary_enabled: bool,
    /// Suffix appended to bucket names on the secondary; empty keeps the same names
    #[serde(default)]
    pub secondary_bucket_suffix: String,
    /// Store each distinct blob once
    #[serde(default)]
    pub single_save: bool,
    /// Encrypt payloads at rest when set
    #[serde(default)]
    pub encryption: Option<EncryptionConfig>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub password: String,
    pub salt: String,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("password", &"..")
            .field("salt", &self.salt)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("secondary object storage is enabled but none was provided")]
    MissingSecondaryStore,
    #[error("secondary object storage is enabled but no event bus was provided")]
    MissingEventBus,
    #[error("single-save is enabled but no blob id registry was provided")]
    MissingRegistry,
    #[error("invalid storage strategy: {0}")]
    InvalidStrategy(String),
}

/// A fully composed blob store.
#[derive(Debug, Clone)]
pub struct ComposedBlobStore {
    /// The outermost decorator, to hand to callers
    pub store: Arc<dyn BlobStoreDao>,
    /// Repair worker for the replication gaps of `store`, when replication is enabled
    pub repair_listener: Option<Arc<FailedBlobOperationListener>>,
}

/// Builds the decorator chain, innermost first:
/// primary (replicated with the secondary when enabled), then the
/// single-save guard, then encryption.
#[derive(Debug)]
pub struct BlobStoreBuilder {
    strategy: StorageStrategyConfig,
    primary: Arc<dyn BlobStoreDao>,
    secondary: Option<Arc<dyn BlobStoreDao>>,
    event_bus: Option<Arc<dyn EventBus>>,
    registry: Option<Arc<dyn BlobIdList>>,
}

impl BlobStoreBuilder {
    pub fn new(strategy: StorageStrategyConfig, primary: Arc<dyn BlobStoreDao>) -> Self {
        Self {
            strategy,
            primary,
            secondary: None,
            event_bus: None,
            registry: None,
        }
    }

    pub fn secondary(mut self, secondary: Arc<dyn BlobStoreDao>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn BlobIdList>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ComposedBlobStore, BuildError> {
        let strategy = self.strategy;
        let mut store = self.primary.clone();
        let mut repair_listener = None;

        if strategy.secondary_enabled {
            let secondary = self.secondary.ok_or(BuildError::MissingSecondaryStore)?;
            let event_bus = self.event_bus.ok_or(BuildError::MissingEventBus)?;
            let mapping = SecondaryBucketMapping::new(strategy.secondary_bucket_suffix.clone())
                .map_err(|e| BuildError::InvalidStrategy(e.to_string()))?;

            repair_listener = Some(Arc::new(FailedBlobOperationListener::new(
                self.primary.clone(),
                secondary.clone(),
                mapping.clone(),
            )));
            store = Arc::new(SecondaryBlobStoreDao::new(
                self.primary,
                secondary,
                mapping,
                event_bus,
            ));
            tracing::info!(
                suffix = %strategy.secondary_bucket_suffix,
                "secondary object storage enabled"
            );
        }

        if strategy.single_save {
            let registry = self.registry.ok_or(BuildError::MissingRegistry)?;
            store = Arc::new(SingleSaveBlobStoreDao::new(
                store,
                registry,
                strategy.default_bucket.clone(),
            ));
            tracing::info!(default_bucket = %strategy.default_bucket, "single-save enabled");
        }

        if let Some(encryption) = &strategy.encryption {
            let secret = Secret::derive(&encryption.password, &encryption.salt);
            store = Arc::new(EncryptedBlobStoreDao::new(store, secret));
            tracing::info!("payload encryption enabled");
        }

        Ok(ComposedBlobStore {
            store,
            repair_listener,
        })
    }
}
