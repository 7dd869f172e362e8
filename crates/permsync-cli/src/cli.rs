use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "permsync")]
#[command(about = "permsync CLI: reconcile folder sharing and group membership with control sheets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./permsync.toml when present)
    #[arg(short, long, global = true, env = "PERMSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace state file
    #[arg(short, long, global = true, env = "PERMSYNC_STATE")]
    pub state: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the state file and the control sheets
    Init(InitArgs),
    /// Run a sync over the control sheets
    Sync(SyncArgs),
    /// Plan pending removals, confirm, then apply them
    SyncDeletes(SyncDeletesArgs),
    /// Sync only if something changed since the last snapshot
    AutoSync,
    /// Report what changed since the last snapshot
    DetectChanges,
    /// Append manually added group members to a user sheet
    Merge(MergeArgs),
    /// Show the last recorded sync status
    Status,
    /// Manage change requests
    Requests(RequestsArgs),
}

#[derive(clap::Args)]
pub struct InitArgs {
    /// Spreadsheet name
    #[arg(long, default_value = "permsync")]
    pub name: String,
    /// Spreadsheet owner
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(clap::Args)]
pub struct SyncArgs {
    /// Only add members; never remove
    #[arg(long, conflicts_with = "remove_only")]
    pub add_only: bool,
    /// Only remove members; never add or create anything
    #[arg(long)]
    pub remove_only: bool,
    /// Compute the plans without changing anything
    #[arg(long)]
    pub plan: bool,
    /// Only rows whose folder or group name starts with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
    /// Only these 1-based rows
    #[arg(long = "row")]
    pub rows: Vec<usize>,
}

#[derive(clap::Args)]
pub struct SyncDeletesArgs {
    /// Apply without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(clap::Args)]
pub struct MergeArgs {
    /// User sheet to append to
    pub sheet: String,
    /// Group whose members are merged in
    pub group: String,
}

#[derive(clap::Args)]
pub struct RequestsArgs {
    #[command(subcommand)]
    pub command: RequestsCommands,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum ActionArg {
    #[default]
    Update,
    Delete,
}

#[derive(Subcommand)]
pub enum RequestsCommands {
    /// List every change request
    List,
    /// Propose an edit to a control sheet
    Submit(SubmitArgs),
    /// Approve a pending request
    Approve(DecisionArgs),
    /// Reject a pending request
    Reject(RejectArgs),
    /// Evaluate pending requests now
    Process,
}

#[derive(clap::Args)]
pub struct SubmitArgs {
    /// Requester email
    #[arg(long)]
    pub by: String,
    /// Target control sheet
    #[arg(long)]
    pub sheet: String,
    /// Natural key of the target row
    #[arg(long)]
    pub key: String,
    #[arg(long, default_value = "update")]
    pub action: ActionArg,
    /// Cells of the proposed row, in column order
    pub cells: Vec<String>,
}

#[derive(clap::Args)]
pub struct DecisionArgs {
    pub id: String,
    /// Approver email
    #[arg(long)]
    pub by: String,
}

#[derive(clap::Args)]
pub struct RejectArgs {
    pub id: String,
    /// Approver email
    #[arg(long)]
    pub by: String,
    #[arg(long)]
    pub reason: Option<String>,
}
