//! Desired-state records read from the control sheets.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level a group is granted on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderRole {
    Editor,
    Viewer,
    Commenter,
}

impl FolderRole {
    pub const ALL: [FolderRole; 3] = [Self::Editor, Self::Viewer, Self::Commenter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Editor => "Editor",
            Self::Viewer => "Viewer",
            Self::Commenter => "Commenter",
        }
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            "commenter" => Ok(Self::Commenter),
            _ => Err(CoreError::unsupported_role(s.trim())),
        }
    }
}

/// Role of a member inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    #[default]
    Member,
    Manager,
    Owner,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "MEMBER",
            Self::Manager => "MANAGER",
            Self::Owner => "OWNER",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "MEMBER" => Ok(Self::Member),
            "MANAGER" => Ok(Self::Manager),
            "OWNER" => Ok(Self::Owner),
            other => Err(CoreError::unsupported_role(other)),
        }
    }
}

/// A single address in a membership list, desired or observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub email: String,
    pub role: MemberRole,
    #[serde(default)]
    pub disabled: bool,
}

impl MembershipEntry {
    pub fn member(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: MemberRole::Member,
            disabled: false,
        }
    }

    pub fn with_role(email: impl Into<String>, role: MemberRole) -> Self {
        Self {
            email: email.into(),
            role,
            disabled: false,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn is_owner(&self) -> bool {
        self.role == MemberRole::Owner
    }
}

/// One ManagedFolders row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderBinding {
    /// 1-based sheet row.
    pub row: usize,
    pub folder_name: String,
    pub folder_id: Option<String>,
    pub role: FolderRole,
    pub group_email: Option<String>,
    pub user_sheet_name: Option<String>,
    pub delete_requested: bool,
}

impl FolderBinding {
    /// Name of the user sheet this binding should own.
    pub fn expected_sheet_name(&self) -> String {
        user_sheet_name_for(&self.folder_name, self.role)
    }
}

/// One UserGroups row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBinding {
    pub row: usize,
    pub group_name: String,
    pub group_email: Option<String>,
    pub source_sheet_name: Option<String>,
    pub delete_requested: bool,
}

impl GroupBinding {
    pub fn expected_sheet_name(&self) -> String {
        group_sheet_name_for(&self.group_name)
    }
}

/// `<FolderName>_<Role>`
pub fn user_sheet_name_for(folder_name: &str, role: FolderRole) -> String {
    format!("{}_{}", folder_name.trim(), role)
}

/// `<GroupName>_G`
pub fn group_sheet_name_for(group_name: &str) -> String {
    format!("{}_G", group_name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_role_parse() {
        assert_eq!("editor".parse::<FolderRole>().unwrap(), FolderRole::Editor);
        assert_eq!(" Viewer ".parse::<FolderRole>().unwrap(), FolderRole::Viewer);
        assert_eq!(
            "COMMENTER".parse::<FolderRole>().unwrap(),
            FolderRole::Commenter
        );
        let err = "unsupported-role".parse::<FolderRole>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported role: \"unsupported-role\"");
    }

    #[test]
    fn test_member_role_serde() {
        let json = serde_json::to_string(&MemberRole::Owner).unwrap();
        assert_eq!(json, "\"OWNER\"");
        assert_eq!("".parse::<MemberRole>().unwrap(), MemberRole::Member);
    }

    #[test]
    fn test_sheet_names() {
        assert_eq!(
            user_sheet_name_for("MockFolderName", FolderRole::Viewer),
            "MockFolderName_Viewer"
        );
        assert_eq!(group_sheet_name_for("Marketing "), "Marketing_G");
    }

    #[test]
    fn test_owner_flag() {
        assert!(MembershipEntry::with_role("o@x.com", MemberRole::Owner).is_owner());
        assert!(!MembershipEntry::member("m@x.com").is_owner());
    }
}
