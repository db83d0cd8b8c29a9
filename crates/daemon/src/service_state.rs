use std::sync::Arc;
use std::time::Duration;

use common::builder::{BlobStoreBuilder, BuildError};
use common::repair::FailedBlobOperationListener;
use object_store::{BlobStoreDao, BlobStoreError, ObjectStoreDao, SqliteBlobIdList};

use crate::database::{Database, DatabaseSetupError, SqliteEventBus};
use crate::state::AppState;

/// Everything a command needs to talk to the configured storage.
#[derive(Clone, Debug)]
pub struct State {
    store: Arc<dyn BlobStoreDao>,
    event_bus: Arc<SqliteEventBus>,
    repair_listener: Option<Arc<FailedBlobOperationListener>>,
    poll_interval: Duration,
}

impl State {
    pub async fn from_app_state(state: &AppState) -> Result<Self, StateSetupError> {
        let config = &state.config;

        let primary = ObjectStoreDao::new(config.primary.clone())
            .await
            .map_err(StateSetupError::Primary)?;

        let repair_db = Database::open(&state.repair_db_path).await?;
        let event_bus = Arc::new(SqliteEventBus::new(
            repair_db,
            config.repair.retry_policy(),
        ));

        let mut builder = BlobStoreBuilder::new(config.strategy.clone(), Arc::new(primary))
            .event_bus(event_bus.clone());

        if config.strategy.secondary_enabled {
            if let Some(secondary_config) = &config.secondary {
                let secondary = ObjectStoreDao::new(secondary_config.clone())
                    .await
                    .map_err(StateSetupError::Secondary)?;
                builder = builder.secondary(Arc::new(secondary));
            }
        }

        if config.strategy.single_save {
            let registry = SqliteBlobIdList::new(&state.registry_db_path)
                .await
                .map_err(StateSetupError::Registry)?;
            builder = builder.registry(Arc::new(registry));
        }

        let composed = builder.build()?;
        tracing::debug!(
            replicated = composed.repair_listener.is_some(),
            single_save = config.strategy.single_save,
            encrypted = config.strategy.encryption.is_some(),
            "blob store ready"
        );

        Ok(Self {
            store: composed.store,
            event_bus,
            repair_listener: composed.repair_listener,
            poll_interval: config.repair.poll_interval(),
        })
    }

    pub fn store(&self) -> &Arc<dyn BlobStoreDao> {
        &self.store
    }

    pub fn event_bus(&self) -> &Arc<SqliteEventBus> {
        &self.event_bus
    }

    /// The repair worker, present only when replication is enabled.
    pub fn repair_listener(&self) -> Option<&Arc<FailedBlobOperationListener>> {
        self.repair_listener.as_ref()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("primary object storage setup failed: {0}")]
    Primary(#[source] BlobStoreError),

    #[error("secondary object storage setup failed: {0}")]
    Secondary(#[source] BlobStoreError),

    #[error("blob id registry setup failed: {0}")]
    Registry(#[source] BlobStoreError),

    #[error("repair queue setup failed: {0}")]
    Database(#[from] DatabaseSetupError),

    #[error("storage composition failed: {0}")]
    Build(#[from] BuildError),
}
