//! Observed-state fetcher.

use std::sync::Arc;

use permsync_core::{MembershipEntry, normalize_email};
use permsync_storage::StorageError;

use crate::context::SyncContext;
use crate::error::Result;

/// Every member of a group, following continuation tokens to the end.
///
/// A group that does not exist yet yields an empty list. Any other directory
/// error propagates. Results are cached on the context until invalidated.
pub async fn fetch_members(ctx: &SyncContext, group_email: &str) -> Result<Arc<Vec<MembershipEntry>>> {
    let key = normalize_email(group_email);
    if let Some(cached) = ctx.cached_members(&key) {
        return Ok(cached);
    }

    let mut members = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = match ctx
            .remote
            .directory
            .list_members(&key, token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(StorageError::NotFound { .. }) if token.is_none() => {
                tracing::debug!(group = %key, "group does not exist yet");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        members.extend(
            page.members
                .into_iter()
                .map(|m| MembershipEntry::with_role(normalize_email(&m.email), m.role)),
        );
        match page.next_page_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    tracing::debug!(group = %key, members = members.len(), "fetched group members");
    Ok(ctx.cache_members(&key, members))
}
