//! Folder resolution and sharing.

use permsync_core::FolderRole;
use permsync_storage::FolderInfo;

use crate::context::SyncContext;
use crate::error::{EngineError, Result};

/// A folder located (or created) for a binding row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFolder {
    pub folder: FolderInfo,
    pub created: bool,
    pub renamed: bool,
}

/// Resolves a folder by ID first, then by exact name.
///
/// A folder found by ID under another name is renamed when
/// `sync.rename_folders_on_mismatch` is set. Name search creates the folder
/// when nothing matches and refuses to pick between several matches.
///
/// # Errors
///
/// Returns `EngineError::Validation` on a name mismatch that may not be fixed
/// or on an ambiguous name.
pub async fn resolve_folder(
    ctx: &SyncContext,
    name: &str,
    id: Option<&str>,
) -> Result<ResolvedFolder> {
    let folders = &ctx.remote.folders;

    if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
        match folders.get_folder_by_id(id).await? {
            Some(folder) if name.is_empty() || folder.name == name => {
                return Ok(ResolvedFolder {
                    folder,
                    created: false,
                    renamed: false,
                });
            }
            Some(folder) => {
                if !ctx.config.sync.rename_folders_on_mismatch {
                    return Err(EngineError::validation(format!(
                        "Folder name mismatch for ID \"{id}\": the sheet says \"{name}\" but the folder is named \"{}\".",
                        folder.name
                    )));
                }
                let renamed = folders.rename_folder(id, name).await?;
                ctx.record_change();
                ctx.info(format!(
                    "Renamed folder {id} from \"{}\" to \"{name}\".",
                    folder.name
                ));
                return Ok(ResolvedFolder {
                    folder: renamed,
                    created: false,
                    renamed: true,
                });
            }
            None => {
                ctx.warn(format!(
                    "Folder ID \"{id}\" not found; looking the folder up by name \"{name}\"."
                ));
            }
        }
    }

    if name.is_empty() {
        return Err(EngineError::not_found("folder", id.unwrap_or_default()));
    }

    let mut matches = folders.find_folders_by_name(name).await?;
    match matches.len() {
        0 => {
            let folder = folders.create_folder(name).await?;
            ctx.record_change();
            ctx.info(format!("Created folder \"{name}\" ({}).", folder.id));
            Ok(ResolvedFolder {
                folder,
                created: true,
                renamed: false,
            })
        }
        1 => Ok(ResolvedFolder {
            folder: matches.remove(0),
            created: false,
            renamed: false,
        }),
        n => Err(EngineError::validation(format!(
            "Ambiguous folder name \"{name}\": {n} folders match. Set FolderID to pick one."
        ))),
    }
}

/// Grants `role` to `principal` unless it already holds exactly that role.
/// Returns whether a grant was made.
pub async fn ensure_folder_access(
    ctx: &SyncContext,
    folder_id: &str,
    principal: &str,
    role: FolderRole,
) -> Result<bool> {
    let folders = &ctx.remote.folders;
    if folders.get_access(folder_id, principal).await? == Some(role) {
        return Ok(false);
    }
    folders.grant(folder_id, principal, role).await?;
    ctx.record_change();
    tracing::info!(folder = %folder_id, principal = %principal, role = %role, "folder access granted");
    Ok(true)
}
