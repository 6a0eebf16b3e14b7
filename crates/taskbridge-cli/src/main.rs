mod commands;

use clap::{Parser, Subcommand};

use commands::sync::{SyncArgs, run_sync};

#[derive(Parser)]
#[command(name = "taskbridge")]
#[command(about = "Keep an Obsidian vault and Apple Reminders in agreement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one vault with its Reminders lists
    Sync(SyncArgs),
}

fn main() {
    let cli = Cli::parse();
    let code = match &cli.command {
        Commands::Sync(args) => run_sync(args),
    };
    std::process::exit(code);
}
