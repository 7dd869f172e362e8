//! Email normalization, validation and group-address generation.

use crate::error::{CoreError, Result};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex must compile")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

static GROUP_NAME_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]").expect("group name regex must compile"));

/// Trims and lowercases an address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate)
}

/// Splits a cell on whitespace, commas and semicolons, dropping empty tokens.
pub fn split_tokens(raw: &str) -> Vec<&str> {
    raw.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parses a cell that must hold at most one address.
///
/// Blank cells yield `Ok(None)`. A cell with more than one token is rejected
/// rather than truncated to its first address.
///
/// # Errors
///
/// Returns `CoreError::MultipleEmails` or `CoreError::InvalidEmail`.
pub fn parse_single_email(raw: &str) -> Result<Option<String>> {
    let tokens = split_tokens(raw);
    match tokens.as_slice() {
        [] => Ok(None),
        [single] => {
            let email = normalize_email(single);
            if is_valid_email(&email) {
                Ok(Some(email))
            } else {
                Err(CoreError::invalid_email(raw.trim()))
            }
        }
        _ => Err(CoreError::multiple_emails(raw.trim())),
    }
}

/// Derives a group address from a display name.
///
/// The name is lowercased, whitespace runs become `-` and anything outside
/// `[a-z0-9-]` is dropped.
///
/// # Errors
///
/// Returns `CoreError::Configuration` when no domain is known, and
/// `CoreError::Validation` when nothing usable remains of the name.
pub fn generate_group_email(base_name: &str, domain: Option<&str>) -> Result<String> {
    let domain = domain
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| CoreError::configuration("Could not determine user domain."))?;

    let lowered = base_name.to_lowercase();
    let dashed = WHITESPACE_RE.replace_all(&lowered, "-");
    let sanitized = GROUP_NAME_STRIP_RE.replace_all(&dashed, "");
    if sanitized.is_empty() {
        return Err(CoreError::validation(format!(
            "Cannot derive a group email from \"{base_name}\""
        )));
    }

    Ok(format!("{sanitized}@{domain}"))
}
