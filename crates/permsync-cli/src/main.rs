mod cli;
mod commands;
mod logging;
mod output;
mod session;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;
use session::{Session, resolve_state_path};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = permsync_config::loader::load_config_with_default_path(cli.config.as_ref())
        .context("Configuration error")?;
    logging::init_tracing(&config.logging.level);
    let config = Arc::new(config);
    let state = resolve_state_path(cli.state.as_deref());

    let session = match &cli.command {
        Commands::Init(args) => {
            Session::create(&state, config, &args.name, args.owner.as_deref()).await?
        }
        _ => Session::open(&state, config).await?,
    };
    let outcome = match &cli.command {
        Commands::Init(_) => commands::init(&session).await,
        Commands::Sync(args) => commands::sync::sync(&session, args).await,
        Commands::SyncDeletes(args) => commands::sync::sync_deletes(&session, args).await,
        Commands::AutoSync => commands::sync::auto_sync(&session).await,
        Commands::DetectChanges => return commands::sync::detect_changes(&session).await,
        Commands::Merge(args) => commands::sync::merge(&session, args).await,
        Commands::Status => return commands::status(&session).await,
        Commands::Requests(args) => commands::requests::run(&session, &args.command).await,
    };
    // Failed runs still record their status.
    session.save().await?;
    outcome
}
