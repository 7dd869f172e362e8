//! Scheduled runs gated by change detection.

mod common;

use common::{Harness, test_config};
use permsync_engine::prelude::*;
use time::Duration;

const UG: &[&str] = &[
    "GroupName",
    "GroupEmail",
    "UserSheetName",
    "LastSynced",
    "Status",
    "Delete",
];

async fn harness() -> Harness {
    let h = Harness::new().await;
    h.put("UserGroups", &[UG, &["Team", "team@example.com", "Team_G"]])
        .await;
    h.put("Team_G", &[&["Email", "Disabled"], &["alice@example.com", ""]])
        .await;
    h.ws.drive.seed_folder("folder-7", "Reports").await;
    h.put(
        "ManagedFolders",
        &[
            &["FolderName", "FolderID", "Role", "UserSheetName"],
            &["Reports", "folder-7", "Viewer", "Reports_Viewer"],
        ],
    )
    .await;
    h
}

fn ran(outcome: AutoSyncOutcome) -> (ChangeDetection, RunSummary) {
    match outcome {
        AutoSyncOutcome::Ran { detection, summary } => (detection, summary),
        other => panic!("expected a run, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_run_has_no_snapshot() {
    let h = harness().await;

    let detection = h.reconciler().detect_changes().await.expect("detect");

    assert!(detection.should_run);
    assert_eq!(
        detection.reasons,
        vec!["No previous AutoSync snapshot was found.".to_string()]
    );
}

#[tokio::test]
async fn test_second_run_without_changes_is_skipped() {
    let h = harness().await;
    let reconciler = h.reconciler();

    let (_, summary) = ran(reconciler.auto_sync().await.expect("first run"));
    assert_eq!(summary.operation, "AutoSync");
    assert_eq!(h.members("team@example.com").await, vec!["alice@example.com"]);

    match reconciler.auto_sync().await.expect("second run") {
        AutoSyncOutcome::Unchanged(detection) => {
            assert!(!detection.should_run);
            assert!(detection.reasons.is_empty());
        }
        other => panic!("expected no run, got {other:?}"),
    }
    let status = reconciler.last_status().await.expect("status").expect("recorded");
    assert_eq!(status.state, SyncState::Skipped);
}

#[tokio::test]
async fn test_sheet_edit_triggers_a_run() {
    let h = harness().await;
    let reconciler = h.reconciler();
    ran(reconciler.auto_sync().await.expect("first run"));

    h.clock.advance(Duration::minutes(5));
    h.put(
        "Team_G",
        &[
            &["Email", "Disabled"],
            &["alice@example.com", ""],
            &["bob@example.com", ""],
        ],
    )
    .await;

    let (detection, summary) = ran(reconciler.auto_sync().await.expect("second run"));

    assert!(
        detection
            .reasons
            .contains(&"Control sheet data changed since the last snapshot.".to_string())
    );
    assert!(
        detection
            .reasons
            .iter()
            .any(|r| r.starts_with("Spreadsheet modified at "))
    );
    assert_eq!(summary.totals().added, 1);
    assert_eq!(
        h.members("team@example.com").await,
        vec!["alice@example.com", "bob@example.com"]
    );
}

#[tokio::test]
async fn test_folder_activity_triggers_a_run() {
    let h = harness().await;
    let reconciler = h.reconciler();
    ran(reconciler.auto_sync().await.expect("first run"));

    h.clock.advance(Duration::minutes(5));
    h.ws.drive.touch("folder-7").await;

    let detection = reconciler.detect_changes().await.expect("detect");

    assert_eq!(detection.reasons.len(), 1);
    assert!(detection.reasons[0].starts_with("Folder folder-7 modified at "));
}

#[tokio::test]
async fn test_unreadable_folder_forces_a_run() {
    let h = harness().await;
    let reconciler = h.reconciler();
    ran(reconciler.auto_sync().await.expect("first run"));

    h.ws.drive.make_unreadable("folder-7").await;

    let detection = reconciler.detect_changes().await.expect("detect");

    assert!(detection.should_run);
    assert!(detection.reasons[0].contains("folder folder-7"));
    assert!(detection.reasons[0].ends_with("forcing a run."));
}

#[tokio::test]
async fn test_disabled_auto_sync_does_nothing() {
    let mut config = test_config();
    config.auto_sync.enabled = false;
    let h = Harness::with_config(config).await;
    h.put("UserGroups", &[UG, &["Team", "team@example.com", "Team_G"]])
        .await;

    let outcome = h.reconciler().auto_sync().await.expect("auto sync");

    assert_eq!(outcome, AutoSyncOutcome::Disabled);
    assert!(!h.ws.directory.has_group("team@example.com").await);
}
