//! A loaded workspace state file plus the reconciler wired to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use permsync_config::AppConfig;
use permsync_db_memory::{FileLock, MemoryWorkspace};
use permsync_engine::{Collaborators, Reconciler};
use permsync_notifications::build_notifier;
use permsync_storage::{DynClock, LockLease, MutualExclusionLock, StorageError, SystemClock};

const DEFAULT_STATE_FILE: &str = "permsync-state.json";
const SESSION_LOCK: &str = "permsync-state";

/// `--state`, else the per-user data directory, else the working directory.
pub fn resolve_state_path(cli_state: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_state {
        return path.to_path_buf();
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("permsync").join("state.json"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}

fn lock_dir(state_path: &Path) -> PathBuf {
    match state_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub struct Session {
    pub workspace: MemoryWorkspace,
    pub reconciler: Reconciler,
    path: PathBuf,
    // Held for the whole invocation so load and save cannot interleave.
    _lease: Box<dyn LockLease>,
}

impl Session {
    /// Creates a fresh state file. Fails if one already exists.
    pub async fn create(
        path: &Path,
        config: Arc<AppConfig>,
        name: &str,
        owner: Option<&str>,
    ) -> Result<Self> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            anyhow::bail!("State file {} already exists", path.display());
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let lease = Self::lock(path, &config).await?;
        let clock: DynClock = Arc::new(SystemClock);
        let workspace = MemoryWorkspace::new(name, owner, clock);
        Self::assemble(path, config, workspace, lease)
    }

    /// Opens an existing state file.
    pub async fn open(path: &Path, config: Arc<AppConfig>) -> Result<Self> {
        let lease = Self::lock(path, &config).await?;
        let clock: DynClock = Arc::new(SystemClock);
        let workspace = match MemoryWorkspace::load(path, clock).await {
            Ok(workspace) => workspace,
            Err(StorageError::NotFound { .. }) => anyhow::bail!(
                "No workspace at {}. Run: permsync init --state {}",
                path.display(),
                path.display()
            ),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "workspace loaded");
        Self::assemble(path, config, workspace, lease)
    }

    async fn lock(path: &Path, config: &AppConfig) -> Result<Box<dyn LockLease>> {
        FileLock::new(lock_dir(path))
            .acquire(SESSION_LOCK, config.lock_wait())
            .await
            .context("Another permsync command is using this workspace")
    }

    fn assemble(
        path: &Path,
        config: Arc<AppConfig>,
        workspace: MemoryWorkspace,
        lease: Box<dyn LockLease>,
    ) -> Result<Self> {
        let notifier = build_notifier(&config.notifications)?;
        let collaborators = Collaborators {
            directory: workspace.directory.clone(),
            folders: workspace.drive.clone(),
            sheets: workspace.sheets.clone(),
            properties: workspace.properties.clone(),
            clock: Arc::new(SystemClock),
        };
        let lock = Arc::new(FileLock::new(lock_dir(path)));
        let reconciler = Reconciler::new(collaborators, config, lock, notifier);
        Ok(Self {
            workspace,
            reconciler,
            path: path.to_path_buf(),
            _lease: lease,
        })
    }

    pub async fn save(&self) -> Result<()> {
        self.workspace
            .save(&self.path)
            .await
            .with_context(|| format!("saving {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_state_path_wins() {
        let path = resolve_state_path(Some(Path::new("/tmp/ws.json")));
        assert_eq!(path, PathBuf::from("/tmp/ws.json"));
    }

    #[test]
    fn test_lock_dir_for_bare_file_name() {
        assert_eq!(lock_dir(Path::new("state.json")), PathBuf::from("."));
        assert_eq!(lock_dir(Path::new("/var/ps/state.json")), PathBuf::from("/var/ps"));
    }
}
