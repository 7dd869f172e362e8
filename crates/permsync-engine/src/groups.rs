//! Group resolution.

use permsync_storage::{GroupInfo, NewGroup, StorageError};

use crate::context::SyncContext;
use crate::error::Result;

/// Returns the group, creating it when missing. The flag is true on creation.
pub async fn get_or_create_group(
    ctx: &SyncContext,
    email: &str,
    name: &str,
) -> Result<(GroupInfo, bool)> {
    let directory = &ctx.remote.directory;
    if let Some(group) = directory.get_group(email).await? {
        return Ok((group, false));
    }

    let request = NewGroup {
        email: email.to_string(),
        name: name.to_string(),
        description: format!("Managed by permsync for \"{name}\"."),
    };
    let group = match directory.insert_group(&request).await {
        Ok(group) => group,
        // Created by someone else between the lookup and the insert.
        Err(StorageError::AlreadyExists { .. }) => directory
            .get_group(email)
            .await?
            .ok_or_else(|| StorageError::not_found("group", email))?,
        Err(e) => return Err(e.into()),
    };
    ctx.record_change();
    ctx.invalidate_members(email);
    ctx.info(format!("Created group {email}."));
    Ok((group, true))
}

/// Deletes a group; a group that is already gone counts as deleted.
pub async fn delete_group(ctx: &SyncContext, email: &str) -> Result<bool> {
    match ctx.remote.directory.delete_group(email).await {
        Ok(()) => {
            ctx.record_change();
            ctx.invalidate_members(email);
            ctx.info(format!("Deleted group {email}."));
            Ok(true)
        }
        Err(StorageError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
