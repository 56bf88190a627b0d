//! Sentinel recognition and marker-tagged JSON extraction.
//!
//! Sentinels are HTML-comment shaped (`<!-- RECORDS -->`) and matched
//! case-insensitively. Payload-carrying markers are followed by a fenced block
//! holding exactly one JSON value.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::fence::FENCE;
use crate::core::scanner::{find_value_start, scan};

static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*([A-Za-z][A-Za-z0-9_-]*)\s*-->").expect("sentinel regex is valid")
});

/// Prefix every sentinel starts with.
pub const COMMENT_OPEN: &str = "<!--";

/// Sentinel kinds the model is instructed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Install,
    Schemas,
    Records,
    Action,
    SectionStart,
    SectionEnd,
}

impl Marker {
    pub const ALL: [Marker; 6] = [
        Marker::Install,
        Marker::Schemas,
        Marker::Records,
        Marker::Action,
        Marker::SectionStart,
        Marker::SectionEnd,
    ];

    /// Accepted sentinel names; the first is the canonical one.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Marker::Install => &["INSTALL"],
            Marker::Schemas => &["SCHEMAS"],
            Marker::Records => &["RECORDS"],
            Marker::Action => &["ACTION"],
            Marker::SectionStart => &["SECTSTART", "SECTION_START"],
            Marker::SectionEnd => &["SECTEND", "SECTION_END"],
        }
    }

    /// Schema and record lists are always arrays.
    pub fn carries_array(self) -> bool {
        matches!(self, Marker::Schemas | Marker::Records)
    }

    /// Markers whose presence starts a structured installation message.
    pub fn starts_section(self) -> bool {
        matches!(
            self,
            Marker::Install | Marker::Schemas | Marker::Records | Marker::SectionStart
        )
    }

    pub fn from_name(name: &str) -> Option<Marker> {
        Marker::ALL.into_iter().find(|marker| {
            marker
                .names()
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(name))
        })
    }
}

/// A complete sentinel occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel<'a> {
    pub start: usize,
    pub end: usize,
    pub name: &'a str,
}

impl Sentinel<'_> {
    pub fn marker(&self) -> Option<Marker> {
        Marker::from_name(self.name)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Every complete sentinel in the text, recognized or not.
pub fn sentinels(text: &str) -> impl Iterator<Item = Sentinel<'_>> {
    SENTINEL_RE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1)?;
        Some(Sentinel {
            start: whole.start(),
            end: whole.end(),
            name: name.as_str(),
        })
    })
}

/// First occurrence of `marker` (any of its names) at or after `from`.
pub fn find_marker(text: &str, marker: Marker, from: usize) -> Option<Sentinel<'_>> {
    sentinels(text).find(|sentinel| sentinel.start >= from && sentinel.marker() == Some(marker))
}

/// Remove every recognized sentinel from `text`.
pub fn strip_sentinels(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for sentinel in sentinels(text).filter(|s| s.marker().is_some()) {
        out.push_str(&text[last..sentinel.start]);
        last = sentinel.end;
    }
    out.push_str(&text[last..]);
    out
}

/// Extract the JSON value carried by the first `marker_name` sentinel.
///
/// Returns `None` when the marker or its fence is absent, when the value is
/// still incomplete, or when the isolated text is not valid JSON. The fence
/// must open before the next recognized sentinel. If brackets never balance
/// inside the fence, everything up to the closing fence is tried.
pub fn extract(text: &str, marker_name: &str) -> Option<Value> {
    let sentinel = sentinels(text).find(|sentinel| sentinel.is(marker_name))?;
    let window_end = sentinels(text)
        .find(|next| next.start >= sentinel.end && next.marker().is_some())
        .map_or(text.len(), |next| next.start);
    let fence_open = text[sentinel.end..window_end].find(FENCE)? + sentinel.end;
    let body_start = fence_open + FENCE.len();
    let value_start = find_value_start(text, body_start)?;
    let fence_close = text[value_start..]
        .find(FENCE)
        .map(|idx| idx + value_start);

    // A fence that closes before any brace is an empty block.
    if text[body_start..value_start].contains(FENCE) {
        return None;
    }

    let end = match (scan(text, value_start), fence_close) {
        (Some(end), Some(close)) if end > close => close,
        (Some(end), _) => end,
        (None, Some(close)) => close,
        (None, None) => return None,
    };

    serde_json::from_str(text[value_start..end].trim_end()).ok()
}

/// Extract and normalize the payload of a known marker.
///
/// Single-item markers unwrap a one-element array; list markers wrap a lone
/// object into an array.
pub fn extract_marker(text: &str, marker: Marker) -> Option<Value> {
    let value = marker
        .names()
        .iter()
        .find_map(|name| extract(text, name))?;
    Some(normalize_shape(value, marker.carries_array()))
}

fn normalize_shape(value: Value, carries_array: bool) -> Value {
    match value {
        Value::Array(mut items) if !carries_array && items.len() == 1 => items.remove(0),
        Value::Object(_) if carries_array => Value::Array(vec![value]),
        other => other,
    }
}
