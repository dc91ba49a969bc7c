use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+(?:\.\d+)?$").unwrap());
static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|\r?\n").unwrap());

/// Unit suffix stripped from capacity text ("1,200人").
const CAPACITY_UNIT: char = '人';
/// Thousands separators, ASCII and full-width.
const THOUSANDS: [char; 2] = [',', '，'];

/// Collapse every whitespace run (line breaks included) to one space and trim.
pub fn normalize_whitespace(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

/// Normalized, and `None` when nothing is left.
pub fn clean(s: Option<&str>) -> Option<String> {
    s.map(normalize_whitespace).filter(|t| !t.is_empty())
}

/// Plain decimal like "25.03" or "-3"; rejects "NaN", "1e5", placeholders.
pub fn is_decimal(s: &str) -> bool {
    DECIMAL_RE.is_match(s.trim())
}

pub fn parse_decimal(s: &str) -> Option<f64> {
    if is_decimal(s) {
        s.trim().parse().ok()
    } else {
        None
    }
}

/// "1,200人" → 1200, "350.7" → 350. Warns and returns `None` on anything else.
pub fn parse_capacity(raw: &str) -> Option<i64> {
    let stripped: String = normalize_whitespace(raw)
        .chars()
        .filter(|c| !THOUSANDS.contains(c) && *c != CAPACITY_UNIT)
        .collect();
    match parse_decimal(&stripped) {
        Some(v) => Some(v.trunc() as i64),
        None => {
            warn!(raw = %raw, "unparseable capacity, treating as absent");
            None
        }
    }
}

/// Han ideographs, including the compatibility and extension blocks.
pub fn is_ideograph(c: char) -> bool {
    matches!(c,
        '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{30000}'..='\u{3134F}')
}

/// Split a "label:value<br>label:value" description into (ideograph-only label, value) pairs.
/// Segments without a colon, or whose label has no ideographs, are skipped.
pub fn description_pairs(description: &str) -> Vec<(String, String)> {
    LINE_BREAK_RE
        .split(description)
        .filter_map(|segment| {
            let (label, value) = segment.split_once([':', '：'])?;
            let label: String = label.chars().filter(|c| is_ideograph(*c)).collect();
            if label.is_empty() {
                return None;
            }
            Some((label, normalize_whitespace(value)))
        })
        .collect()
}
