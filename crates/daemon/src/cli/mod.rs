pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Cat, DeadLetters, Init, Ls, Put, Repair, Rm, Status, Version};
