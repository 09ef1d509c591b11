use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cache;
mod commands;

use commands::correct::CorrectArgs;
use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scouting sheet label correction pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Correct every label document under the source prefix in the bucket
    Run(RunArgs),
    /// Correct a single local label document against a local ground truth CSV
    Correct(CorrectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => commands::run::handle_run(args).await,
        Command::Correct(args) => commands::correct::handle_correct(args),
    }
}
