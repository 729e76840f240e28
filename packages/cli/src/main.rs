mod commands;
mod config;
mod render;
mod watcher;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{export, watch, ExportArgs, WatchArgs};
use tracing_subscriber::EnvFilter;

/// bbdsl-live - Live validation and preview for BBDSL bidding conventions
#[derive(Parser, Debug)]
#[command(name = "bbdsl-live")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a document and keep its report and preview current
    Watch(WatchArgs),

    /// Export a document once
    Export(ExportArgs),
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Command::Watch(args) => watch(args, &cwd).await,
        Command::Export(args) => export(args, &cwd).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bbdsl_live=info,bbdsl_live_sync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
