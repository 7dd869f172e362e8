//! End-to-end sync runs against the in-memory workspace.

mod common;

use common::{Harness, OWNER, test_config};
use permsync_core::FolderRole;
use permsync_db_memory::FaultKind;
use permsync_engine::prelude::*;
use permsync_engine::status::SyncState;
use permsync_notifications::Severity;
use permsync_storage::{MutualExclusionLock, SheetStore};
use std::time::Duration;

const MF: &[&str] = &[
    "FolderName",
    "FolderID",
    "Role",
    "UserSheetName",
    "GroupEmail",
    "URL",
    "LastSynced",
    "Status",
    "Delete",
];
const UG: &[&str] = &[
    "GroupName",
    "GroupEmail",
    "UserSheetName",
    "LastSynced",
    "Status",
    "Delete",
];
const USERS: &[&str] = &["Email", "Disabled"];

/// One UserGroups row bound to `team@example.com` through sheet `Team_G`.
async fn team_harness(sheet_rows: &[&[&str]], observed: &[&str]) -> Harness {
    let h = Harness::new().await;
    h.put("UserGroups", &[UG, &["Team", "team@example.com", "Team_G"]])
        .await;
    let mut rows = vec![USERS];
    rows.extend_from_slice(sheet_rows);
    h.put("Team_G", &rows).await;
    h.seed_group("team@example.com", observed).await;
    h
}

// =============================================================================
// Managed folders
// =============================================================================

#[tokio::test]
async fn test_folder_row_is_provisioned() {
    let h = Harness::new().await;
    h.put("ManagedFolders", &[MF, &["Reports", "", "Editor"]]).await;
    h.put(
        "Reports_Editor",
        &[USERS, &["alice@example.com", ""], &["bob@example.com", "TRUE"]],
    )
    .await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    assert_eq!(h.cell("ManagedFolders", 2, "Status").await, "OK");
    let folder_id = h.cell("ManagedFolders", 2, "FolderID").await;
    assert_eq!(folder_id, "folder-1");
    assert_eq!(
        h.cell("ManagedFolders", 2, "GroupEmail").await,
        "reportseditor@example.com"
    );
    assert_eq!(
        h.cell("ManagedFolders", 2, "UserSheetName").await,
        "Reports_Editor"
    );
    assert!(!h.cell("ManagedFolders", 2, "URL").await.is_empty());
    assert!(!h.cell("ManagedFolders", 2, "LastSynced").await.is_empty());

    assert_eq!(
        h.members("reportseditor@example.com").await,
        vec!["alice@example.com".to_string()]
    );
    let access = h.ws.drive.access_list(&folder_id).await;
    assert_eq!(
        access.get("reportseditor@example.com"),
        Some(&FolderRole::Editor)
    );

    assert_eq!(summary.folders.processed, 1);
    assert_eq!(summary.folders.summary.added, 1);
    assert!(summary.log.iter().any(|l| l.message
        == "Found 1 active emails in sheet \"Reports_Editor\" (skipped 1 disabled entries)."));
}

#[tokio::test]
async fn test_missing_user_sheet_is_created() {
    let h = Harness::new().await;
    h.ws.drive.seed_folder("f-7", "Designs").await;
    h.put("ManagedFolders", &[MF, &["Designs", "f-7", "Viewer"]])
        .await;

    h.reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    assert!(h.ws.sheets.has_sheet("Designs_Viewer").await);
    assert_eq!(h.sheet("Designs_Viewer").await[0], common::row(USERS));
    assert!(h.ws.directory.has_group("designsviewer@example.com").await);
    assert_eq!(h.ws.drive.folder_count().await, 1);
}

#[tokio::test]
async fn test_ambiguous_folder_name_is_a_row_error() {
    let h = Harness::new().await;
    h.ws.drive.seed_folder("a", "Shared").await;
    h.ws.drive.seed_folder("b", "Shared").await;
    h.put("ManagedFolders", &[MF, &["Shared", "", "Viewer"]]).await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("row errors do not abort the run");

    assert_eq!(summary.folders.errors.len(), 1);
    let status = h.cell("ManagedFolders", 2, "Status").await;
    assert!(
        status.starts_with("Error: Ambiguous folder name \"Shared\""),
        "unexpected status: {status}"
    );
    assert_eq!(h.ws.drive.folder_count().await, 2);
}

#[tokio::test]
async fn test_duplicate_folder_role_binding_is_flagged() {
    let h = Harness::new().await;
    h.ws.drive.seed_folder("f-1", "Reports").await;
    h.put(
        "ManagedFolders",
        &[
            MF,
            &["Reports", "f-1", "Viewer", "", "one@example.com"],
            &["Reports", "f-1", "Viewer", "", "two@example.com"],
            &["Reports", "f-1", "Editor", "", "three@example.com"],
        ],
    )
    .await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("row errors do not abort the run");

    assert_eq!(h.cell("ManagedFolders", 2, "Status").await, "OK");
    assert_eq!(h.cell("ManagedFolders", 4, "Status").await, "OK");
    let status = h.cell("ManagedFolders", 3, "Status").await;
    assert!(
        status.starts_with("Error: Duplicate binding for folder \"f-1\" role Viewer"),
        "unexpected status: {status}"
    );
    assert_eq!(summary.folders.errors.len(), 1);
    assert_eq!(summary.folders.errors[0].row, 3);

    let access = h.ws.drive.access_list("f-1").await;
    assert_eq!(access.get("one@example.com"), Some(&FolderRole::Viewer));
    assert_eq!(access.get("three@example.com"), Some(&FolderRole::Editor));
    assert!(!access.contains_key("two@example.com"));
}

#[tokio::test]
async fn test_folder_renamed_on_id_mismatch() {
    let h = Harness::new().await;
    h.ws.drive.seed_folder("f-1", "Old name").await;
    h.put("ManagedFolders", &[MF, &["New name", "f-1", "Commenter"]])
        .await;

    h.reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    use permsync_storage::FolderStore;
    let folder = h
        .ws
        .drive
        .get_folder_by_id("f-1")
        .await
        .unwrap()
        .expect("folder exists");
    assert_eq!(folder.name, "New name");
    assert_eq!(h.cell("ManagedFolders", 2, "Status").await, "OK");
}

#[tokio::test]
async fn test_folder_mismatch_without_rename_is_rejected() {
    let mut config = test_config();
    config.sync.rename_folders_on_mismatch = false;
    let h = Harness::with_config(config).await;
    h.ws.drive.seed_folder("f-1", "Old name").await;
    h.put("ManagedFolders", &[MF, &["New name", "f-1", "Viewer"]])
        .await;

    h.reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("row errors do not abort the run");

    let status = h.cell("ManagedFolders", 2, "Status").await;
    assert!(status.contains("Folder name mismatch for ID \"f-1\""), "{status}");
}

#[tokio::test]
async fn test_invalid_role_is_flagged() {
    let h = Harness::new().await;
    h.put("ManagedFolders", &[MF, &["Reports", "", "Owner"]]).await;

    h.reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("row errors do not abort the run");

    assert!(
        h.cell("ManagedFolders", 2, "Status")
            .await
            .starts_with("Error: ")
    );
    assert_eq!(h.ws.drive.folder_count().await, 0);
}

#[tokio::test]
async fn test_deletion_row_tears_down_binding() {
    let h = Harness::new().await;
    h.put("ManagedFolders", &[MF, &["Reports", "", "Editor"]]).await;
    h.put("Reports_Editor", &[USERS, &["alice@example.com", ""]])
        .await;
    let reconciler = h.reconciler();
    reconciler
        .sync_all(SyncOptions::default())
        .await
        .expect("first sync");

    let folder_id = h.cell("ManagedFolders", 2, "FolderID").await;
    h.ws.sheets
        .write_cell("ManagedFolders", 2, 9, "TRUE".into())
        .await
        .unwrap();

    let summary = reconciler
        .sync_all(SyncOptions::default())
        .await
        .expect("deletion sync");

    assert_eq!(summary.folders.deleted, 1);
    assert_eq!(h.sheet("ManagedFolders").await.len(), 1);
    assert!(!h.ws.sheets.has_sheet("Reports_Editor").await);
    assert!(!h.ws.directory.has_group("reportseditor@example.com").await);
    assert!(h.ws.drive.access_list(&folder_id).await.is_empty());
}

#[tokio::test]
async fn test_deletion_rows_wait_for_full_mode() {
    let h = Harness::new().await;
    h.put("UserGroups", &[UG, &["Team", "", "", "", "", "TRUE"]])
        .await;

    let summary = h.reconciler().sync_adds().await.expect("add-only sync");

    assert_eq!(summary.groups.deleted, 0);
    assert_eq!(h.sheet("UserGroups").await.len(), 2);
    assert!(
        summary
            .log
            .iter()
            .any(|l| l.message.contains("Skipping 1 deletion row(s)"))
    );
}

// =============================================================================
// Membership
// =============================================================================

#[tokio::test]
async fn test_disabled_member_is_kept_and_absent_member_removed() {
    let h = team_harness(
        &[&["alice@example.com", ""], &["bob@example.com", "TRUE"]],
        &["alice@example.com", "bob@example.com", "carol@example.com"],
    )
    .await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    let plans = summary.plans();
    let team = plans
        .iter()
        .find(|p| p.group_email == "team@example.com")
        .expect("team plan");
    assert!(team.to_add.is_empty());
    let removed: Vec<&str> = team.to_remove.iter().map(|m| m.email.as_str()).collect();
    assert_eq!(removed, vec!["carol@example.com"]);
    assert_eq!(
        h.members("team@example.com").await,
        vec!["alice@example.com", "bob@example.com"]
    );
    assert_eq!(h.cell("UserGroups", 2, "Status").await, "OK");
}

#[tokio::test]
async fn test_disabled_members_removed_when_configured() {
    let mut config = test_config();
    config.sync.remove_disabled_members = true;
    let h = Harness::with_config(config).await;
    h.put("UserGroups", &[UG, &["Team", "team@example.com", "Team_G"]])
        .await;
    h.put("Team_G", &[USERS, &["bob@example.com", "yes"]]).await;
    h.seed_group("team@example.com", &["bob@example.com"]).await;

    h.reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    assert!(h.members("team@example.com").await.is_empty());
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let h = team_harness(
        &[&["alice@example.com", ""], &["dave@example.com", ""]],
        &["alice@example.com", "carol@example.com"],
    )
    .await;
    let reconciler = h.reconciler();

    let first = reconciler
        .sync_all(SyncOptions::default())
        .await
        .expect("first sync");
    assert_eq!(first.groups.summary.added, 1);
    assert_eq!(first.groups.summary.removed, 1);

    let second = reconciler
        .sync_all(SyncOptions::default())
        .await
        .expect("second sync");
    assert!(second.groups.plans.is_empty());
    assert_eq!(second.groups.summary.changed(), 0);
}

#[tokio::test]
async fn test_row_with_two_emails_is_rejected() {
    let h = team_harness(
        &[
            &["a@x.com b@y.com", ""],
            &["alice@example.com", ""],
        ],
        &[],
    )
    .await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    assert_eq!(
        h.members("team@example.com").await,
        vec!["alice@example.com"]
    );
    assert!(
        summary
            .log
            .iter()
            .any(|l| l.level == permsync_engine::LogLevel::Error
                && l.message.contains("multiple email addresses"))
    );
}

#[tokio::test]
async fn test_add_only_never_removes() {
    let h = team_harness(
        &[&["alice@example.com", ""], &["dave@example.com", ""]],
        &["carol@example.com"],
    )
    .await;

    let summary = h.reconciler().sync_adds().await.expect("add-only sync");

    assert_eq!(summary.groups.summary.removed, 0);
    assert_eq!(
        h.members("team@example.com").await,
        vec!["alice@example.com", "carol@example.com", "dave@example.com"]
    );
}

#[tokio::test]
async fn test_plan_only_changes_nothing() {
    let h = team_harness(&[&["alice@example.com", ""]], &["carol@example.com"]).await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default().planning())
        .await
        .expect("plan");

    assert!(summary.plan_only);
    assert_eq!(summary.plans().len(), 1);
    assert_eq!(h.members("team@example.com").await, vec!["carol@example.com"]);
    assert_eq!(h.cell("UserGroups", 2, "Status").await, "");
    assert!(summary.text().starts_with("Sync plan: planned 1 addition(s) and 1 removal(s)"));
}

#[tokio::test]
async fn test_prefix_filter_limits_rows() {
    let h = Harness::new().await;
    h.put(
        "UserGroups",
        &[UG, &["Alpha team", "", ""], &["Beta team", "", ""]],
    )
    .await;

    let options = SyncOptions {
        name_prefix: Some("Alpha".into()),
        ..SyncOptions::default()
    };
    let summary = h.reconciler().sync_all(options).await.expect("sync");

    assert_eq!(summary.groups.processed, 1);
    assert!(h.ws.directory.has_group("alpha-teamg@example.com").await);
    assert!(!h.ws.directory.has_group("beta-teamg@example.com").await);
    assert!(summary.editors.group_email.is_empty());
}

// =============================================================================
// Apply executor
// =============================================================================

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let h = team_harness(&[&["alice@example.com", ""]], &[]).await;
    h.ws.directory
        .inject_fault("alice@example.com", FaultKind::Transient, 2)
        .await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    assert_eq!(summary.groups.summary.added, 1);
    assert_eq!(summary.groups.summary.failed, 0);
    assert_eq!(h.ws.directory.mutation_calls(), 3);
    assert!(h.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_one_bad_member_does_not_block_the_rest() {
    let h = team_harness(
        &[
            &["alice@example.com", ""],
            &["bad@example.com", ""],
            &["dave@example.com", ""],
        ],
        &[],
    )
    .await;
    h.ws.directory
        .inject_fault("bad@example.com", FaultKind::Permanent, 10)
        .await;

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("member failures are not fatal");

    let totals = summary.totals();
    assert_eq!(totals.added, 2);
    assert_eq!(totals.failed, 1);
    assert_eq!(totals.failures[0].email, "bad@example.com");

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Info);
    assert!(sent[0].body.contains("failed 1"));
}

// =============================================================================
// Sheet editors
// =============================================================================

#[tokio::test]
async fn test_sheet_editors_follow_the_sheet() {
    let h = Harness::new().await;
    h.put(
        "SheetEditors",
        &[
            &["Email", "Name", "Disabled"],
            &["alice@example.com", "Alice", ""],
            &["bob@example.com", "Bob", "x"],
        ],
    )
    .await;
    h.ws.sheets
        .add_editors(&["bob@example.com".to_string(), "eve@example.com".to_string()])
        .await
        .unwrap();

    let summary = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect("sync should succeed");

    let mut editors = h.ws.sheets.editors().await.unwrap();
    editors.sort();
    assert_eq!(editors, vec!["alice@example.com", OWNER]);
    assert_eq!(summary.editors.group_email, "control-editors@example.com");
    assert_eq!(
        h.members("control-editors@example.com").await,
        vec!["alice@example.com"]
    );
    assert_eq!(summary.editors.editors_added, vec!["alice@example.com"]);
}

#[tokio::test]
async fn test_add_only_keeps_disabled_editors() {
    let h = Harness::new().await;
    h.put(
        "SheetEditors",
        &[&["Email", "Name", "Disabled"], &["bob@example.com", "", "TRUE"]],
    )
    .await;
    h.ws.sheets
        .add_editors(&["bob@example.com".to_string()])
        .await
        .unwrap();

    h.reconciler().sync_adds().await.expect("add-only sync");

    assert!(
        h.ws.sheets
            .editors()
            .await
            .unwrap()
            .contains(&"bob@example.com".to_string())
    );
}

// =============================================================================
// Entry points
// =============================================================================

#[tokio::test]
async fn test_sync_deletes_asks_before_removing() {
    let h = team_harness(&[&["alice@example.com", ""]], &["alice@example.com", "carol@example.com"]).await;
    let reconciler = h.reconciler();

    let outcome = reconciler
        .sync_deletes(|plans| {
            assert_eq!(plans.len(), 1);
            assert_eq!(plans[0].to_remove[0].email, "carol@example.com");
            false
        })
        .await
        .expect("planning succeeds");
    assert!(matches!(outcome, DeletionOutcome::Cancelled(ref plans) if plans.len() == 1));
    assert_eq!(h.members("team@example.com").await.len(), 2);

    let outcome = reconciler
        .sync_deletes(|_| true)
        .await
        .expect("removal succeeds");
    let DeletionOutcome::Applied(summary) = outcome else {
        panic!("expected removals to be applied");
    };
    assert_eq!(summary.totals().removed, 1);
    assert_eq!(h.members("team@example.com").await, vec!["alice@example.com"]);

    let outcome = reconciler
        .sync_deletes(|_| panic!("nothing to confirm"))
        .await
        .expect("nothing pending");
    assert_eq!(outcome, DeletionOutcome::NothingPending);
    let status = reconciler.last_status().await.unwrap().expect("status");
    assert_eq!(status.state, SyncState::Skipped);
    assert_eq!(status.summary, "No user removals are pending.");
}

#[tokio::test]
async fn test_lock_contention_fails_fast() {
    let h = Harness::new().await;
    let _held = h
        .lock
        .acquire("permsync-sync", Duration::from_millis(10))
        .await
        .expect("first holder gets the lock");

    let err = h
        .reconciler()
        .sync_all(SyncOptions::default())
        .await
        .expect_err("second sync must not run");

    assert!(matches!(err, EngineError::LockUnavailable(_)));
    assert!(err.to_string().starts_with("Sync already in progress"));

    let status = h.reconciler().last_status().await.unwrap().expect("status");
    assert_eq!(status.state, SyncState::Failed);

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Error);
    assert!(sent[0].body.contains("Nothing was changed."));
}

#[tokio::test]
async fn test_success_is_recorded() {
    let h = team_harness(&[&["alice@example.com", ""]], &[]).await;
    let reconciler = h.reconciler();
    reconciler
        .sync_all(SyncOptions::default())
        .await
        .expect("sync");

    let status = reconciler.last_status().await.unwrap().expect("status");
    assert_eq!(status.state, SyncState::Success);
    assert_eq!(status.operation, "Full sync");
    assert_eq!(status.source, SyncSource::Manual);
    assert!(status.summary.contains("Added 1, removed 0, failed 0."));
}

// =============================================================================
// Merge sync
// =============================================================================

#[tokio::test]
async fn test_merge_appends_manual_members() {
    let h = team_harness(
        &[&["alice@example.com", ""], &["bob@example.com", "TRUE"]],
        &["alice@example.com", "bob@example.com", "dave@example.com"],
    )
    .await;

    let report = h
        .reconciler()
        .merge_sync("Team_G", "team@example.com")
        .await
        .expect("merge");

    assert_eq!(report.appended, vec!["dave@example.com"]);
    let sheet = h.sheet("Team_G").await;
    assert_eq!(sheet.len(), 4);
    assert_eq!(sheet[3][0].as_text(), "dave@example.com");
    assert_eq!(h.members("team@example.com").await.len(), 3);
}

#[tokio::test]
async fn test_merge_skips_missing_sheet() {
    let h = Harness::new().await;
    h.seed_group("team@example.com", &["dave@example.com"]).await;

    let report = h
        .reconciler()
        .merge_sync("Nope_G", "team@example.com")
        .await
        .expect("merge");

    assert!(report.skipped);
    assert!(report.appended.is_empty());
}
