pub mod cat;
pub mod dead_letters;
pub mod init;
pub mod ls;
pub mod put;
pub mod repair;
pub mod rm;
pub mod status;
pub mod version;

pub use cat::Cat;
pub use dead_letters::DeadLetters;
pub use init::Init;
pub use ls::Ls;
pub use put::Put;
pub use repair::Repair;
pub use rm::Rm;
pub use status::Status;
pub use version::Version;
