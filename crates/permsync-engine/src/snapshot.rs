//! Change detection for scheduled runs.
//!
//! A snapshot is a content hash of the control sheets (plus every user sheet
//! they reference) and the last-update times of the spreadsheet and each
//! managed folder. A scheduled run is skipped only when the stored snapshot
//! positively matches; anything uncertain forces a run.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use permsync_core::{Grid, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::macros::format_description;

use crate::context::SyncContext;
use crate::error::Result;
use crate::sheets::{MANAGED_FOLDERS, SHEET_EDITORS, SheetTable, USER_GROUPS};

/// Persisted between runs under `auto_sync.snapshot_key`.
///
/// Every field is optional on read; only fields present in the stored
/// snapshot are compared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSyncSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_last_updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_states: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetection {
    pub should_run: bool,
    pub reasons: Vec<String>,
    pub snapshot: AutoSyncSnapshot,
}

/// ISO rendering with milliseconds, as used in reasons.
fn iso_millis(millis: i64) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    Timestamp::from_unix_millis(millis)
        .ok()
        .and_then(|t| t.into_inner().format(&format).ok())
        .unwrap_or_else(|| millis.to_string())
}

/// Captures the current state. Timestamps that could not be read are left
/// out of the snapshot and reported as reasons.
pub async fn capture_snapshot(ctx: &SyncContext) -> Result<(AutoSyncSnapshot, Vec<String>)> {
    let sheets = ctx.remote.sheets.as_ref();
    let mut failures = Vec::new();

    // 1. Content hash
    let mut contents: BTreeMap<String, Option<Grid>> = BTreeMap::new();
    let mut folder_ids = Vec::new();
    for name in [MANAGED_FOLDERS, USER_GROUPS, SHEET_EDITORS] {
        let grid = sheets.read_sheet(name).await?;
        if let Some(grid) = &grid {
            let table = SheetTable::from_grid(name, grid.clone());
            for (_, row) in table.rows() {
                let user_sheet = table.text(row, "UserSheetName");
                if !user_sheet.is_empty() && !contents.contains_key(&user_sheet) {
                    let user_grid = sheets.read_sheet(&user_sheet).await?;
                    contents.insert(user_sheet, user_grid);
                }
                if name == MANAGED_FOLDERS {
                    let id = table.text(row, "FolderID");
                    if !id.is_empty() && !folder_ids.contains(&id) {
                        folder_ids.push(id);
                    }
                }
            }
        }
        contents.insert(name.to_string(), grid);
    }
    let digest = Sha256::digest(serde_json::to_vec(&contents)?);
    let data_hash = STANDARD.encode(digest);

    // 2. Spreadsheet timestamp
    let spreadsheet_last_updated = match sheets.last_updated().await {
        Ok(at) => Some(at.unix_millis()),
        Err(e) => {
            failures.push(format!(
                "Could not read the spreadsheet's last update time ({e}); forcing a run."
            ));
            None
        }
    };

    // 3. Folder timestamps
    let mut folder_states = BTreeMap::new();
    for id in folder_ids {
        match ctx.remote.folders.last_updated(&id).await {
            Ok(at) => {
                folder_states.insert(id, at.unix_millis());
            }
            Err(e) => failures.push(format!(
                "Could not read last update time for folder {id} ({e}); forcing a run."
            )),
        }
    }

    Ok((
        AutoSyncSnapshot {
            data_hash: Some(data_hash),
            spreadsheet_last_updated,
            folder_states: Some(folder_states),
            captured_at: Some(ctx.now()),
        },
        failures,
    ))
}

/// The stored snapshot. A malformed value counts as missing.
pub async fn load_snapshot(ctx: &SyncContext) -> Result<Option<AutoSyncSnapshot>> {
    let key = &ctx.config.auto_sync.snapshot_key;
    let Some(raw) = ctx.remote.properties.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            ctx.warn(format!("Ignoring unreadable AutoSync snapshot: {e}"));
            Ok(None)
        }
    }
}

pub async fn save_snapshot(ctx: &SyncContext, snapshot: &AutoSyncSnapshot) -> Result<()> {
    let raw = serde_json::to_string(snapshot)?;
    ctx.remote
        .properties
        .set(&ctx.config.auto_sync.snapshot_key, &raw)
        .await?;
    Ok(())
}

/// Compares the current state with the stored snapshot.
pub async fn detect_changes(ctx: &SyncContext) -> Result<ChangeDetection> {
    let (current, failures) = capture_snapshot(ctx).await?;
    let previous = load_snapshot(ctx).await?;
    let mut reasons = failures;

    match &previous {
        None => reasons.push("No previous AutoSync snapshot was found.".to_string()),
        Some(previous) => reasons.extend(compare(previous, &current)),
    }

    let detection = ChangeDetection {
        should_run: !reasons.is_empty(),
        reasons,
        snapshot: current,
    };
    tracing::info!(
        should_run = detection.should_run,
        reasons = detection.reasons.len(),
        "change detection finished"
    );
    Ok(detection)
}

fn compare(previous: &AutoSyncSnapshot, current: &AutoSyncSnapshot) -> Vec<String> {
    let mut reasons = Vec::new();

    if let (Some(before), Some(now)) = (&previous.data_hash, &current.data_hash) {
        if before != now {
            reasons.push("Control sheet data changed since the last snapshot.".to_string());
        }
    }

    if let (Some(before), Some(now)) = (
        previous.spreadsheet_last_updated,
        current.spreadsheet_last_updated,
    ) {
        if now > before {
            reasons.push(format!("Spreadsheet modified at {}.", iso_millis(now)));
        }
    }

    if let (Some(before), Some(now)) = (&previous.folder_states, &current.folder_states) {
        for (id, updated) in now {
            match before.get(id) {
                Some(seen) if updated > seen => {
                    reasons.push(format!("Folder {id} modified at {}.", iso_millis(*updated)));
                }
                Some(_) => {}
                None => reasons.push(format!("Folder {id} is newly managed.")),
            }
        }
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

    fn snapshot(hash: &str, sheet: Option<i64>, folders: &[(&str, i64)]) -> AutoSyncSnapshot {
        AutoSyncSnapshot {
            data_hash: Some(hash.into()),
            spreadsheet_last_updated: sheet,
            folder_states: Some(folders.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
            captured_at: None,
        }
    }

    #[test]
    fn test_iso_millis() {
        assert_eq!(iso_millis(T0 + 300_000), "2024-01-01T00:05:00.000Z");
    }

    #[test]
    fn test_unchanged_state_has_no_reasons() {
        let snap = snapshot("h", Some(T0), &[("folder-1", T0)]);
        assert!(compare(&snap, &snap.clone()).is_empty());
    }

    #[test]
    fn test_folder_modification() {
        let before = snapshot("h", Some(T0), &[("folder-1", T0)]);
        let after = snapshot("h", Some(T0), &[("folder-1", T0 + 300_000)]);
        assert_eq!(
            compare(&before, &after),
            vec!["Folder folder-1 modified at 2024-01-01T00:05:00.000Z.".to_string()]
        );
    }

    #[test]
    fn test_only_stored_fields_are_compared() {
        let before = AutoSyncSnapshot {
            data_hash: Some("h".into()),
            folder_states: Some(BTreeMap::from([("folder-1".to_string(), T0)])),
            ..AutoSyncSnapshot::default()
        };
        let after = snapshot("h", Some(T0 + 1), &[("folder-1", T0)]);
        assert!(compare(&before, &after).is_empty());
    }

    #[test]
    fn test_new_folder_and_hash_change() {
        let before = snapshot("a", None, &[]);
        let after = snapshot("b", None, &[("folder-2", T0)]);
        let reasons = compare(&before, &after);
        assert_eq!(reasons.len(), 2);
        assert!(reasons[1].contains("folder-2"));
    }

    #[test]
    fn test_snapshot_json_uses_camel_case() {
        let json = serde_json::to_string(&snapshot("h", Some(T0), &[])).unwrap();
        assert!(json.contains("\"dataHash\""));
        assert!(json.contains("\"spreadsheetLastUpdated\""));
        let parsed: AutoSyncSnapshot =
            serde_json::from_str(r#"{"dataHash":"x","capturedAt":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(parsed.folder_states.is_none());
    }
}
