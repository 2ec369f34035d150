//! Manualroot CLI
//!
//! Index elevator manuals per brand and troubleshoot with them.

use anyhow::Result;
use clap::Parser;
use manualroot_core::error::exit_codes;
use manualroot_core::{Config, Database, ManualRootError};

mod app;
mod commands;
mod output;
mod progress;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<ManualRootError>()
            .map(ManualRootError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let db = Database::open(Database::default_path())?;
    db.initialize()?;
    let config = Config::load()?;

    match cli.command {
        Commands::Brand(args) => commands::brand::run(args, &db, cli.format).await,
        Commands::Index(args) => commands::index::run(args, db, &config, cli.format).await,
        Commands::Search(args) => commands::search::run(args, db, &config, cli.format).await,
        Commands::Chat(args) => commands::chat::run(args, db, &config, cli.format).await,
        Commands::History(args) => commands::history::run(args, &db, cli.format).await,
        Commands::Status => commands::status::run(&db, cli.format).await,
    }
}
