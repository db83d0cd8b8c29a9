pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "postblob")]
#[command(about = "Replicated, deduplicating blob storage")]
pub struct Args {
    /// Path to the postblob config directory (defaults to ~/.postblob)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
