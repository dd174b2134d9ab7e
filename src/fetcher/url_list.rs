//! Plain-text URL lists
//!
//! One URL per line, with blank lines and `#` comments ignored. Remote lists
//! are fitted to what a cycle can dispatch; local files are passed through
//! whole so validation can reject them.

use crate::channel::MAX_FRAME_LEN;

/// Maximum number of URLs taken from one list
pub const MAX_URLS: usize = 1024;

/// Longest URL that still fits in a `URL <target>` frame
pub const MAX_URL_LEN: usize = MAX_FRAME_LEN - "URL ".len();

/// Splits a plain-text document into URLs
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
/// Lines longer than [`MAX_URL_LEN`] are truncated rather than rejected, and
/// at most [`MAX_URLS`] entries are returned.
pub fn parse_url_list(body: &str) -> Vec<String> {
    url_lines(body)
        .take(MAX_URLS)
        .map(|line| truncate_at_char_boundary(line, MAX_URL_LEN).to_string())
        .collect()
}

/// Trimmed URL lines of a document, without any limit applied
pub fn url_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
