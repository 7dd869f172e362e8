use async_trait::async_trait;
use permsync_core::MemberRole;
use permsync_storage::{
    DirectoryMember, GroupDirectory, GroupInfo, MemberPage, NewGroup, StorageError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_PAGE_SIZE: usize = 200;

/// Persisted form of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Lowercased email to role.
    #[serde(default)]
    pub members: BTreeMap<String, MemberRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryState {
    #[serde(default)]
    pub groups: BTreeMap<String, GroupRecord>,
}

/// Kind of failure injected into member mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Rate limiting; retried by callers.
    Transient,
    /// Rejected outright.
    Permanent,
}

#[derive(Debug, Clone)]
struct Fault {
    email: String,
    kind: FaultKind,
    remaining: u32,
}

/// In-memory group directory with paging and fault injection.
#[derive(Debug)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    faults: Mutex<Vec<Fault>>,
    page_size: usize,
    list_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::from_state(DirectoryState::default())
    }

    pub fn from_state(state: DirectoryState) -> Self {
        Self {
            state: RwLock::new(state),
            faults: Mutex::new(Vec::new()),
            page_size: DEFAULT_PAGE_SIZE,
            list_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
        }
    }

    /// Sets how many members a single `list_members` page returns.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn export(&self) -> DirectoryState {
        self.state.read().await.clone()
    }

    /// Creates a group with the given members, replacing any existing one.
    pub async fn seed_group(&self, email: &str, name: &str, members: &[(&str, MemberRole)]) {
        let record = GroupRecord {
            name: name.to_string(),
            description: String::new(),
            members: members
                .iter()
                .map(|(e, r)| (e.to_lowercase(), *r))
                .collect(),
        };
        self.state
            .write()
            .await
            .groups
            .insert(email.to_lowercase(), record);
    }

    /// Members of a group as (email, role) pairs, or `None` if the group is missing.
    pub async fn members_of(&self, group_email: &str) -> Option<Vec<(String, MemberRole)>> {
        self.state
            .read()
            .await
            .groups
            .get(&group_email.to_lowercase())
            .map(|g| g.members.iter().map(|(e, r)| (e.clone(), *r)).collect())
    }

    pub async fn has_group(&self, group_email: &str) -> bool {
        self.state
            .read()
            .await
            .groups
            .contains_key(&group_email.to_lowercase())
    }

    /// Makes the next `times` member mutations touching `email` fail.
    pub async fn inject_fault(&self, email: &str, kind: FaultKind, times: u32) {
        self.faults.lock().await.push(Fault {
            email: email.to_lowercase(),
            kind,
            remaining: times,
        });
    }

    /// Number of `list_members` calls served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of insert/remove member calls received, failed ones included.
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    async fn check_fault(&self, email: &str) -> Result<(), StorageError> {
        let mut faults = self.faults.lock().await;
        let Some(fault) = faults
            .iter_mut()
            .find(|f| f.email == email && f.remaining > 0)
        else {
            return Ok(());
        };
        fault.remaining -= 1;
        match fault.kind {
            FaultKind::Transient => Err(StorageError::rate_limited(format!(
                "quota exceeded while updating {email}"
            ))),
            FaultKind::Permanent => Err(StorageError::invalid(format!(
                "directory rejected {email}"
            ))),
        }
    }
}

#[async_trait]
impl GroupDirectory for InMemoryDirectory {
    async fn list_members(
        &self,
        group_email: &str,
        page_token: Option<&str>,
    ) -> Result<MemberPage, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        let group = state
            .groups
            .get(&group_email.to_lowercase())
            .ok_or_else(|| StorageError::not_found("group", group_email))?;

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StorageError::invalid(format!("bad page token: {token}")))?,
            None => 0,
        };
        let members: Vec<DirectoryMember> = group
            .members
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|(email, role)| DirectoryMember::new(email.clone(), *role))
            .collect();
        let next = offset + members.len();
        let next_page_token = (next < group.members.len()).then(|| next.to_string());

        Ok(MemberPage {
            members,
            next_page_token,
        })
    }

    async fn insert_member(
        &self,
        group_email: &str,
        member: &DirectoryMember,
    ) -> Result<(), StorageError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let email = member.email.to_lowercase();
        self.check_fault(&email).await?;
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(&group_email.to_lowercase())
            .ok_or_else(|| StorageError::not_found("group", group_email))?;
        if group.members.contains_key(&email) {
            return Err(StorageError::already_exists("member", email));
        }
        group.members.insert(email, member.role);
        Ok(())
    }

    async fn remove_member(&self, group_email: &str, email: &str) -> Result<(), StorageError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let email = email.to_lowercase();
        self.check_fault(&email).await?;
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(&group_email.to_lowercase())
            .ok_or_else(|| StorageError::not_found("group", group_email))?;
        group
            .members
            .remove(&email)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("member", email))
    }

    async fn get_group(&self, group_email: &str) -> Result<Option<GroupInfo>, StorageError> {
        let key = group_email.to_lowercase();
        Ok(self.state.read().await.groups.get(&key).map(|g| GroupInfo {
            email: key.clone(),
            name: g.name.clone(),
            description: g.description.clone(),
        }))
    }

    async fn insert_group(&self, group: &NewGroup) -> Result<GroupInfo, StorageError> {
        let key = group.email.to_lowercase();
        let mut state = self.state.write().await;
        if state.groups.contains_key(&key) {
            return Err(StorageError::already_exists("group", key));
        }
        state.groups.insert(
            key.clone(),
            GroupRecord {
                name: group.name.clone(),
                description: group.description.clone(),
                members: BTreeMap::new(),
            },
        );
        Ok(GroupInfo {
            email: key,
            name: group.name.clone(),
            description: group.description.clone(),
        })
    }

    async fn delete_group(&self, group_email: &str) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .groups
            .remove(&group_email.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("group", group_email))
    }
}
