// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Cat, DeadLetters, Init, Ls, Put, Repair, Rm, Status, Version};

command_enum! {
    (Init, Init),
    (Put, Put),
    (Cat, Cat),
    (Rm, Rm),
    (Ls, Ls),
    (Repair, Repair),
    (DeadLetters, DeadLetters),
    (Status, Status),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let guards = cli::op::init_cli_logging(args.config_path.clone());
    let ctx = cli::op::OpContext::new(args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // Flush buffered log lines before exiting
    drop(guards);
    std::process::exit(code);
}
