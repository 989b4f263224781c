//! Text and input-parsing helpers shared by the CLI and the engine

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

/// Sanitize filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re =
        INVALID_CHARS.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("Invalid regex pattern"));

    re.replace_all(filename, "_").to_string()
}

/// Device name as used in preview file names
pub fn file_stem_for_device(device: &str) -> String {
    sanitize_filename(&device.replace(' ', "_"))
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Map full-width ASCII variants (and the full-width colon) to ASCII
pub fn to_half_width(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0xFF01..=0xFF5E => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Parse an operator-typed clock time
///
/// Accepts `HH:MM`, `H:M`, `HHMM` and three-digit shorthands such as `198`
/// (19:08) or `930` (09:30), in half- or full-width digits.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    static CLOCK_RE: OnceLock<Regex> = OnceLock::new();

    let re = CLOCK_RE
        .get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{1,2})$").expect("Invalid regex pattern"));

    let text = to_half_width(raw.trim());
    let hm = |h: &str, m: &str| -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
    };

    if let Some(caps) = re.captures(&text) {
        return hm(&caps[1], &caps[2]);
    }
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match text.len() {
        1 | 2 => hm(&text, "0"),
        3 => hm(&text[..2], &text[2..]).or_else(|| hm(&text[..1], &text[1..])),
        4 => hm(&text[..2], &text[2..]),
        _ => None,
    }
}

/// Parse a duration in hours: `1.5`, `1:30` or `90m`
pub fn parse_duration_hours(raw: &str) -> Option<f64> {
    let text = to_half_width(raw.trim());
    if let Some(minutes) = text.strip_suffix('m') {
        return minutes.trim().parse::<f64>().ok().map(|m| m / 60.0);
    }
    if let Some((h, m)) = text.split_once(':') {
        let h: u32 = h.trim().parse().ok()?;
        let m: u32 = m.trim().parse().ok()?;
        if m >= 60 {
            return None;
        }
        return Some(h as f64 + m as f64 / 60.0);
    }
    text.strip_suffix('h').unwrap_or(&text).trim().parse().ok()
}

/// Parse a calendar date as `YYYY-MM-DD` or `MM.DD.YYYY`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = to_half_width(raw.trim());
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%m.%d.%Y"))
        .ok()
}
