pub mod requests;
pub mod sync;

use anyhow::Result;
use colored::Colorize;
use permsync_engine::SyncState;

use crate::output::print_success;
use crate::session::Session;

pub async fn init(session: &Session) -> Result<()> {
    let created = session.reconciler.setup().await?;
    print_success(&format!("Workspace created at {}", session.path().display()));
    for sheet in created {
        println!("  {} {sheet}", "+".green());
    }
    Ok(())
}

pub async fn status(session: &Session) -> Result<()> {
    let Some(status) = session.reconciler.last_status().await? else {
        println!("No sync has run yet.");
        return Ok(());
    };
    let state = match status.state {
        SyncState::Success => status.state.to_string().green(),
        SyncState::Skipped => status.state.to_string().yellow(),
        SyncState::Failed => status.state.to_string().red(),
    };
    println!("{}: {}", "Operation".cyan(), status.operation);
    println!("{}: {state}", "State".cyan());
    println!("{}: {}", "Source".cyan(), status.source);
    println!("{}: {}", "At".cyan(), status.at);
    println!("{}: {}", "Summary".cyan(), status.summary);
    Ok(())
}
