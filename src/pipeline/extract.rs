//! Profile extraction: recognized text → [`ProfileRecord`].
//!
//! OCR output from a profile screenshot is noisy, so extraction is a handful
//! of line-level heuristics rather than a parser. None of them can fail; a
//! field the text does not support is left as an empty string.
//!
//! ## Rules
//!
//! 1. Split on line breaks, trim, drop empty lines
//! 2. `name`         : first line
//! 3. `bio`          : the up-to-three lines after the name, minus any that
//!    match a keyword rule below, joined with single spaces
//! 4. `followers`    : first line containing "followers"
//! 5. `following`    : first line containing "following"
//! 6. `guessLocation`: first line containing "india", "city" or "location"
//!
//! Keyword matching is case-insensitive and ties go to the earliest line.

use serde::{Deserialize, Serialize};

/// Number of lines after the name considered for the bio.
const BIO_WINDOW: usize = 3;

const FOLLOWERS_KEYWORDS: &[&str] = &["followers"];
const FOLLOWING_KEYWORDS: &[&str] = &["following"];
const LOCATION_KEYWORDS: &[&str] = &["india", "city", "location"];

/// The structured result of one screenshot.
///
/// Every field is always present in serialized output; missing information is
/// an empty string, never `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub name: String,
    pub bio: String,
    pub followers: String,
    pub following: String,
    pub guess_location: String,
}

impl ProfileRecord {
    /// True when no rule produced anything.
    pub fn is_empty(&self) -> bool {
        self == &ProfileRecord::default()
    }
}

/// Build a [`ProfileRecord`] from recognized text.
pub fn extract(text: &str) -> ProfileRecord {
    let lines = non_empty_lines(text);

    ProfileRecord {
        name: lines.first().map(|l| l.to_string()).unwrap_or_default(),
        bio: bio(&lines),
        followers: first_matching(&lines, FOLLOWERS_KEYWORDS),
        following: first_matching(&lines, FOLLOWING_KEYWORDS),
        guess_location: first_matching(&lines, LOCATION_KEYWORDS),
    }
}

/// Trimmed, non-empty lines in document order.
pub fn non_empty_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

fn bio(lines: &[&str]) -> String {
    lines
        .iter()
        .skip(1)
        .take(BIO_WINDOW)
        .filter(|l| !is_keyword_line(l))
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_matching(lines: &[&str], keywords: &[&str]) -> String {
    lines
        .iter()
        .find(|l| contains_any(l, keywords))
        .map(|l| l.to_string())
        .unwrap_or_default()
}

fn is_keyword_line(line: &str) -> bool {
    [FOLLOWERS_KEYWORDS, FOLLOWING_KEYWORDS, LOCATION_KEYWORDS]
        .iter()
        .any(|keywords| contains_any(line, keywords))
}

fn contains_any(line: &str, keywords: &[&str]) -> bool {
    let lower = line.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}
