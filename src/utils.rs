//! Utility functions for digit normalization, HTML text extraction, local
//! time formatting and log-friendly string truncation.

use chrono::{DateTime, FixedOffset, Utc};
use itertools::Itertools;
use scraper::ElementRef;

/// Iran has observed a fixed UTC+03:30 since daylight saving was abolished in 2022.
const TEHRAN_OFFSET_SECS: i32 = 3 * 3600 + 30 * 60;

/// Convert Persian (`۰-۹`) and Arabic-Indic (`٠-٩`) digits to Latin digits.
///
/// Only strings that are digit-only once trimmed are translated; everything
/// else, including the empty string, is returned unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(to_latin_digits("۱۶۵۰۰۰"), "165000");
/// assert_eq!(to_latin_digits("۱۶۵,۰۰۰"), "۱۶۵,۰۰۰");
/// ```
pub fn to_latin_digits(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.chars().all(is_any_digit) {
        return text.to_string();
    }
    text.chars().map(latin_digit).collect()
}

fn is_any_digit(c: char) -> bool {
    c.is_ascii_digit() || ('۰'..='۹').contains(&c) || ('٠'..='٩').contains(&c)
}

fn latin_digit(c: char) -> char {
    let offset = match c {
        '۰'..='۹' => c as u32 - '۰' as u32,
        '٠'..='٩' => c as u32 - '٠' as u32,
        _ => return c,
    };
    char::from_digit(offset, 10).unwrap_or(c)
}

/// Remove the grouping separators used on Persian pages (`,`, `٬` and spaces).
pub fn strip_grouping(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ',' | '٬') && !c.is_whitespace())
        .collect()
}

/// Text of an element with every fragment trimmed and empty fragments dropped,
/// joined with `sep`.
pub fn element_text(element: ElementRef<'_>, sep: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .join(sep)
}

/// Character count, which is what every length threshold in the pipeline is
/// expressed in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn to_tehran(t: DateTime<Utc>) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(TEHRAN_OFFSET_SECS)
        .map_or_else(|| t.fixed_offset(), |offset| t.with_timezone(&offset))
}

/// `HH:MM` in Tehran time.
pub fn tehran_clock(t: DateTime<Utc>) -> String {
    to_tehran(t).format("%H:%M").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
    }
}
