// Storage modules (repair queue, composed store)
pub mod database;
pub mod process;
pub mod service_state;

// App state (configuration, paths)
pub mod state;

pub use process::{spawn_repair_worker, start_repair_worker, ShutdownHandle};
pub use service_state::{State as ServiceState, StateSetupError};
pub use state::{AppConfig, AppState, RepairConfig, StateError};
