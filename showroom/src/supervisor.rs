//! Deterministic rewrite of an agent draft into one customer-safe paragraph.

use once_cell::sync::Lazy;
use regex::Regex;

static INTERNAL_ID_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(id[:\s]+#?\d+\b|.*\brequest_id\b|.*\bid de solicitud\b|.*\bsolicitud id\b|.*\bvehicle_id\b)")
        .expect("valid internal id regex")
});

static INLINE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\(\s*id[:\s]+#?\d+\s*\)")
        .expect("valid inline id regex")
});

static LEADING_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]+|\d+[.)]|#{1,6})\s+")
        .expect("valid leading marker regex")
});

static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*|__|`").expect("valid emphasis regex"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Drops internal id lines, list markers and markdown emphasis, then joins the remaining
/// lines into a single paragraph.
pub fn sanitize_final_text(draft: &str) -> String {
    let kept: Vec<String> = draft
        .lines()
        .filter_map(|line| {
            let unmarked = LEADING_MARKER.replace(line.trim(), "");
            let unmarked = unmarked.trim();
            if unmarked.is_empty() || INTERNAL_ID_LINE.is_match(unmarked) {
                return None;
            }
            let plain = EMPHASIS.replace_all(unmarked, "");
            Some(INLINE_ID.replace_all(&plain, "").into_owned())
        })
        .collect();
    WHITESPACE
        .replace_all(&kept.join(" "), " ")
        .trim()
        .to_string()
}
