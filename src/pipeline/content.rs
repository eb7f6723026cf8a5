// src/pipeline/content.rs

//! Joining source contents into one payload.

use std::sync::LazyLock;

use regex::Regex;

/// First line break of a text: `\r\n`, `\n\r`, or a lone `\r` or `\n`.
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r\n?|\n\r?").expect("line-break pattern is valid")
});

/// Line terminator used when no source contains one.
#[cfg(windows)]
pub const PLATFORM_LINEFEED: &str = "\r\n";
#[cfg(not(windows))]
pub const PLATFORM_LINEFEED: &str = "\n";

/// Return the first line break found, scanning `contents` in order.
pub fn detect_separator<S: AsRef<str>>(contents: &[S]) -> Option<&str> {
    contents
        .iter()
        .find_map(|content| LINE_BREAK.find(content.as_ref()))
        .map(|m| m.as_str())
}

/// Separator to join with: the configured one, else the first line break
/// in `contents`, else [`PLATFORM_LINEFEED`].
pub fn resolve_separator<S: AsRef<str>>(configured: Option<&str>, contents: &[S]) -> String {
    configured
        .or_else(|| detect_separator(contents))
        .unwrap_or(PLATFORM_LINEFEED)
        .to_string()
}
