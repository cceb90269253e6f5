//! Speaker-marker recognition.
//!
//! A dialogue line may open with a marker naming its speaker:
//!
//! ```text
//! 상현: ...        지민: ...
//! 진행자 A: ...    진행자 B: ...
//! Host A: ...      Host B: ...
//! A: ...  A. ...   B: ...  B. ...
//! **상현**: ...    **지민:** ...
//! ```
//!
//! A separator (`:`, full-width `：`, or `.` followed by whitespace for the
//! bare letters) is required, so prose such as "상현이 웃었다" is never
//! mistaken for a marker.

use crate::models::Speaker;
use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*\**\s*(?P<name>상현|지민|진행자\s*[AB]|Host\s*[AB]|[AB])\s*\**\s*(?P<sep>[:：.])\**(?P<ws>\s*)",
    )
    .unwrap()
});

fn speaker_for(name: &str) -> Option<Speaker> {
    match name {
        "상현" => Some(Speaker::HostA),
        "지민" => Some(Speaker::HostB),
        _ => match name.chars().last()?.to_ascii_uppercase() {
            'A' => Some(Speaker::HostA),
            'B' => Some(Speaker::HostB),
            _ => None,
        },
    }
}

/// Split `line` into its speaker marker (if any) and the remaining text.
///
/// Unmarked lines come back unchanged with `None`.
pub fn recognize(line: &str) -> (Option<Speaker>, &str) {
    let Some(caps) = MARKER.captures(line) else {
        return (None, line);
    };
    let name = &caps["name"];
    let bare = name.len() == 1;
    if &caps["sep"] == "." && (!bare || caps["ws"].is_empty()) {
        return (None, line);
    }
    match speaker_for(name) {
        Some(speaker) => {
            let end = caps.get(0).map_or(0, |m| m.end());
            (Some(speaker), line[end..].trim())
        }
        None => (None, line),
    }
}

/// Whether `line` opens with a speaker marker.
pub fn is_marked(line: &str) -> bool {
    recognize(line).0.is_some()
}
