//! Per-platform username plausibility rules.
//!
//! These are cheap syntactic pre-filters run before any network call: a
//! platform whose rule rejects a username is skipped for it entirely.

use crate::error::UsernameCheckError;
use crate::types::Platform;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref GENERIC_FORMAT: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
    static ref PINTEREST_CHARS: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref GITHUB_CHARS: Regex = Regex::new(r"^[A-Za-z0-9-]+$").unwrap();
}

/// Check the platform-independent format: non-empty, letters, digits, `.`, `_` and `-`.
pub fn validate_format(username: &str) -> bool {
    !username.is_empty() && GENERIC_FORMAT.is_match(username)
}

/// Like [`validate_format`], with a reason for the caller to display.
pub fn require_format(username: &str) -> Result<(), UsernameCheckError> {
    if username.is_empty() {
        return Err(UsernameCheckError::invalid_username(
            username,
            "Username cannot be empty",
        ));
    }
    if !GENERIC_FORMAT.is_match(username) {
        return Err(UsernameCheckError::invalid_username(
            username,
            "Only letters, numbers, '.', '_' and '-' are allowed",
        ));
    }
    Ok(())
}

/// Whether `username` could legally exist on `platform`.
pub fn is_plausible(platform: Platform, username: &str) -> bool {
    match platform {
        Platform::Pinterest => check_pinterest(username),
        Platform::GitHub => check_github(username),
        Platform::Instagram => check_instagram(username),
    }
}

/// Pinterest: 3-30 characters of `[A-Za-z0-9_]`, not purely numeric.
fn check_pinterest(username: &str) -> bool {
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return false;
    }
    if !PINTEREST_CHARS.is_match(username) {
        return false;
    }
    !username.chars().all(|c| c.is_ascii_digit())
}

/// GitHub: at most 39 characters of `[A-Za-z0-9-]`, no leading, trailing or doubled hyphen.
fn check_github(username: &str) -> bool {
    if username.chars().count() > 39 {
        return false;
    }
    if username.starts_with('-') || username.ends_with('-') {
        return false;
    }
    if username.contains("--") {
        return false;
    }
    GITHUB_CHARS.is_match(username)
}

/// Instagram: at most 30 characters, no leading, trailing or doubled dot.
fn check_instagram(username: &str) -> bool {
    if username.chars().count() > 30 {
        return false;
    }
    if username.starts_with('.') || username.ends_with('.') {
        return false;
    }
    !username.contains("..")
}

/// Parse a username list: one per line, `#` comments and blank lines
/// skipped, duplicates dropped keeping the first occurrence.
pub fn parse_username_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(String::from)
        .collect()
}
