use std::error::Error;
use std::path::PathBuf;

use postblob_daemon::process::init_logging;
use postblob_daemon::state::{AppState, StateError};
use postblob_daemon::{ServiceState, StateSetupError};

/// Install logging as configured in the postblob directory, falling back
/// to `info` on stderr while it is not initialized yet.
///
/// The returned guards must outlive the command.
pub fn init_cli_logging(
    config_path: Option<PathBuf>,
) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    match AppState::load(config_path) {
        Ok(state) => {
            let level = state.config.log_level().unwrap_or(tracing::Level::INFO);
            init_logging(level, state.config.log_dir.as_deref())
        }
        Err(_) => init_logging(tracing::Level::INFO, None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Setup(#[from] StateSetupError),
}

#[derive(Clone, Debug)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.postblob)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn app_state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Open the configured storage.
    pub async fn service(&self) -> Result<ServiceState, ContextError> {
        let state = self.app_state()?;
        Ok(ServiceState::from_app_state(&state).await?)
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
