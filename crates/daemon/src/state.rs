use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::fs;

use common::builder::StorageStrategyConfig;
use common::event_bus::RetryPolicy;
use object_store::ObjectStoreConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "postblob";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const REGISTRY_DB_FILE_NAME: &str = "registry.sqlite";
pub const REPAIR_DB_FILE_NAME: &str = "repair.sqlite";
pub const PRIMARY_DIR_NAME: &str = "primary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default tracing level, overridable through `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolled log files (stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Primary object storage
    #[serde(default)]
    pub primary: ObjectStoreConfig,
    /// Secondary object storage, required when replication is enabled
    #[serde(default)]
    pub secondary: Option<ObjectStoreConfig>,
    #[serde(default)]
    pub strategy: StorageStrategyConfig,
    #[serde(default)]
    pub repair: RepairConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            primary: ObjectStoreConfig::default(),
            secondary: None,
            strategy: StorageStrategyConfig::default(),
            repair: RepairConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reject settings the storage layer cannot be built from.
    pub fn validate(&self) -> Result<(), StateError> {
        self.log_level()?;
        if self.strategy.secondary_enabled && self.secondary.is_none() {
            return Err(StateError::InvalidConfig(
                "strategy.secondary_enabled is set but no [secondary] storage is configured"
                    .to_string(),
            ));
        }
        if self.secondary.is_some() && !self.strategy.secondary_enabled {
            tracing::warn!("[secondary] storage is configured but replication is disabled");
        }
        if self.repair.concurrency == 0 {
            return Err(StateError::InvalidConfig(
                "repair.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_level(&self) -> Result<tracing::Level, StateError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| StateError::InvalidConfig(format!("unknown log level: {}", self.log_level)))
    }
}

/// Repair worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub max_retries: u32,
    pub first_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub poll_interval_ms: u64,
    pub concurrency: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            first_backoff_ms: policy.first_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            poll_interval_ms: 1000,
            concurrency: policy.concurrency,
        }
    }
}

impl RepairConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            first_backoff: Duration::from_millis(self.first_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            concurrency: self.concurrency,
            ..RetryPolicy::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the postblob directory (~/.postblob)
    pub postblob_dir: PathBuf,
    /// Path to the blob id registry database
    pub registry_db_path: PathBuf,
    /// Path to the repair event queue database
    pub repair_db_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the postblob directory path (custom or default ~/.postblob)
    pub fn postblob_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// The configuration `init` writes when none is given: a local primary
    /// inside the postblob directory and no replication.
    pub fn default_config(postblob_dir: &std::path::Path) -> AppConfig {
        AppConfig {
            primary: ObjectStoreConfig::Local {
                path: postblob_dir.join(PRIMARY_DIR_NAME),
            },
            ..AppConfig::default()
        }
    }

    /// Initialize a new postblob state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let postblob_dir = Self::postblob_dir(custom_path)?;

        if postblob_dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }

        let config = config.unwrap_or_else(|| Self::default_config(&postblob_dir));
        config.validate()?;

        fs::create_dir_all(&postblob_dir)?;

        let config_path = postblob_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // Empty files, migrated when first opened
        let registry_db_path = postblob_dir.join(REGISTRY_DB_FILE_NAME);
        fs::write(&registry_db_path, "")?;
        let repair_db_path = postblob_dir.join(REPAIR_DB_FILE_NAME);
        fs::write(&repair_db_path, "")?;

        Ok(Self {
            postblob_dir,
            registry_db_path,
            repair_db_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the postblob directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let postblob_dir = Self::postblob_dir(custom_path)?;

        if !postblob_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let registry_db_path = postblob_dir.join(REGISTRY_DB_FILE_NAME);
        let repair_db_path = postblob_dir.join(REPAIR_DB_FILE_NAME);
        let config_path = postblob_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }
        if !repair_db_path.exists() {
            return Err(StateError::MissingFile(REPAIR_DB_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;
        config.validate()?;

        Ok(Self {
            postblob_dir,
            registry_db_path,
            repair_db_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("postblob directory not initialized. Run 'postblob init' first")]
    NotInitialized,

    #[error("postblob directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use common::builder::EncryptionConfig;

    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");

        let state = AppState::init(Some(root.clone()), None).unwrap();
        assert!(state.config_path.exists());
        assert!(state.registry_db_path.exists());
        assert!(state.repair_db_path.exists());

        let loaded = AppState::load(Some(root.clone())).unwrap();
        assert_eq!(loaded.config, state.config);
        assert_eq!(
            loaded.config.primary,
            ObjectStoreConfig::Local {
                path: root.join(PRIMARY_DIR_NAME)
            }
        );

        assert!(matches!(
            AppState::init(Some(root), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            log_level = "debug"
            log_dir = "/var/log/postblob"

            [primary]
            type = "local"
            path = "/srv/blobs"

            [secondary]
            type = "s3"
            endpoint = "http://localhost:9000"
            access_key = "minioadmin"
            secret_key = "minioadmin"
            bucket = "blobs-eu"

            [strategy]
            secondary_enabled = true
            secondary_bucket_suffix = "-eu"
            single_save = true

            [strategy.encryption]
            password = "hunter2"
            salt = "cluster-a"

            [repair]
            max_retries = 3
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);
        assert!(config.strategy.secondary_enabled);
        assert_eq!(config.strategy.default_bucket.as_str(), "default-bucket");
        assert_eq!(
            config.strategy.encryption,
            Some(EncryptionConfig {
                password: "hunter2".to_string(),
                salt: "cluster-a".to_string(),
            })
        );
        assert_eq!(config.repair.max_retries, 3);
        assert_eq!(config.repair.poll_interval(), Duration::from_millis(250));
        // Unset repair keys keep their defaults
        assert_eq!(config.repair.concurrency, RetryPolicy::default().concurrency);
    }

    #[test]
    fn test_replication_requires_secondary() {
        let mut config = AppConfig::default();
        config.strategy.secondary_enabled = true;

        assert!(matches!(
            config.validate(),
            Err(StateError::InvalidConfig(_))
        ));
    }
}
