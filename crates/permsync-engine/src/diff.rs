//! Diff engine: desired members against observed members.

use permsync_core::MembershipEntry;
use serde::{Deserialize, Serialize};

use crate::reader::DesiredMembers;

/// Membership changes for one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub group_email: String,
    pub sheet_name: String,
    pub to_add: Vec<MembershipEntry>,
    pub to_remove: Vec<MembershipEntry>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Drops whichever half the mode forbids.
    pub fn restrict(mut self, allow_adds: bool, allow_removals: bool) -> Self {
        if !allow_adds {
            self.to_add.clear();
        }
        if !allow_removals {
            self.to_remove.clear();
        }
        self
    }
}

/// Computes `to_add = S − G` and `to_remove = {m ∈ G : m ∉ S, m not OWNER}`.
///
/// Disabled sheet entries are never in `S`. They only appear in `to_remove`
/// when `remove_disabled` is set; otherwise a disabled address that is still a
/// group member is left alone.
pub fn diff(
    group_email: &str,
    sheet_name: &str,
    desired: &DesiredMembers,
    observed: &[MembershipEntry],
    remove_disabled: bool,
) -> SyncPlan {
    let to_add = desired
        .active
        .iter()
        .filter(|d| !observed.iter().any(|o| o.email == d.email))
        .cloned()
        .collect();

    let to_remove = observed
        .iter()
        .filter(|o| !o.is_owner())
        .filter(|o| !desired.contains_active(&o.email))
        .filter(|o| remove_disabled || !desired.is_disabled(&o.email))
        .cloned()
        .collect();

    SyncPlan {
        group_email: group_email.to_string(),
        sheet_name: sheet_name.to_string(),
        to_add,
        to_remove,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permsync_core::MemberRole;

    fn desired(active: &[&str], disabled: &[&str]) -> DesiredMembers {
        DesiredMembers {
            active: active.iter().map(|e| MembershipEntry::member(*e)).collect(),
            disabled: disabled
                .iter()
                .map(|e| MembershipEntry::member(*e).disabled(true))
                .collect(),
            ..DesiredMembers::default()
        }
    }

    fn observed(entries: &[(&str, MemberRole)]) -> Vec<MembershipEntry> {
        entries
            .iter()
            .map(|(e, r)| MembershipEntry::with_role(*e, *r))
            .collect()
    }

    fn emails(entries: &[MembershipEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.email.as_str()).collect()
    }

    #[test]
    fn test_add_and_remove_sets() {
        let plan = diff(
            "g@ex.com",
            "S",
            &desired(&["a@ex.com", "b@ex.com"], &[]),
            &observed(&[("b@ex.com", MemberRole::Member), ("c@ex.com", MemberRole::Member)]),
            false,
        );
        assert_eq!(emails(&plan.to_add), vec!["a@ex.com"]);
        assert_eq!(emails(&plan.to_remove), vec!["c@ex.com"]);
    }

    #[test]
    fn test_owner_never_removed() {
        let plan = diff(
            "g@ex.com",
            "S",
            &desired(&[], &[]),
            &observed(&[
                ("boss@ex.com", MemberRole::Owner),
                ("mgr@ex.com", MemberRole::Manager),
            ]),
            true,
        );
        assert_eq!(emails(&plan.to_remove), vec!["mgr@ex.com"]);
    }

    #[test]
    fn test_disabled_member_is_left_alone() {
        let plan = diff(
            "g@ex.com",
            "S",
            &desired(&["alice@ex.com"], &["bob@ex.com"]),
            &observed(&[
                ("alice@ex.com", MemberRole::Member),
                ("bob@ex.com", MemberRole::Member),
                ("carol@ex.com", MemberRole::Member),
            ]),
            false,
        );
        assert!(plan.to_add.is_empty());
        assert_eq!(emails(&plan.to_remove), vec!["carol@ex.com"]);
    }

    #[test]
    fn test_disabled_member_removed_when_configured() {
        let plan = diff(
            "g@ex.com",
            "S",
            &desired(&["alice@ex.com"], &["bob@ex.com"]),
            &observed(&[("alice@ex.com", MemberRole::Member), ("bob@ex.com", MemberRole::Member)]),
            true,
        );
        assert_eq!(emails(&plan.to_remove), vec!["bob@ex.com"]);
    }

    #[test]
    fn test_second_pass_is_empty() {
        let want = desired(&["a@ex.com", "b@ex.com"], &[]);
        let mut have = observed(&[("b@ex.com", MemberRole::Member), ("z@ex.com", MemberRole::Member)]);
        let first = diff("g@ex.com", "S", &want, &have, false);
        assert!(!first.is_empty());

        have.retain(|m| !first.to_remove.contains(m));
        have.extend(first.to_add.iter().cloned());
        let second = diff("g@ex.com", "S", &want, &have, false);
        assert!(second.is_empty());
    }

    #[test]
    fn test_add_and_remove_are_disjoint() {
        let plan = diff(
            "g@ex.com",
            "S",
            &desired(&["x@ex.com", "y@ex.com"], &[]),
            &observed(&[("x@ex.com", MemberRole::Member), ("q@ex.com", MemberRole::Member)]),
            false,
        );
        for add in &plan.to_add {
            assert!(!plan.to_remove.iter().any(|r| r.email == add.email));
        }
    }

    #[test]
    fn test_restrict_modes() {
        let plan = diff(
            "g@ex.com",
            "S",
            &desired(&["a@ex.com"], &[]),
            &observed(&[("c@ex.com", MemberRole::Member)]),
            false,
        );
        let adds = plan.clone().restrict(true, false);
        assert_eq!(adds.to_add.len(), 1);
        assert!(adds.to_remove.is_empty());
        let removes = plan.restrict(false, true);
        assert!(removes.to_add.is_empty());
        assert_eq!(removes.to_remove.len(), 1);
    }
}
