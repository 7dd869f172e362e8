//! Value types exchanged with collaborators.

use permsync_core::{MemberRole, Timestamp};
use serde::{Deserialize, Serialize};

/// A member as reported by the group directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryMember {
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
}

impl DirectoryMember {
    pub fn new(email: impl Into<String>, role: MemberRole) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }

    pub fn member(email: impl Into<String>) -> Self {
        Self::new(email, MemberRole::Member)
    }
}

/// One page of a paginated membership listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPage {
    pub members: Vec<DirectoryMember>,
    /// Continuation token; `None` on the last page.
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Parameters for creating a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    pub last_updated: Timestamp,
}
