use std::sync::LazyLock;

use regex::Regex;

/// Regex for ISO 8601 durations restricted to hours, minutes and seconds
/// (e.g., PT1H2M3S, PT3M33S, PT45S). Day or year components never match.
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap());

/// Parses an ISO 8601 duration string (e.g., "PT3M33S") into total seconds.
/// Anything that does not match the grammar counts as zero seconds.
pub fn parse_iso8601_duration(duration: &str) -> u64 {
    let Some(caps) = DURATION_RE.captures(duration.trim()) else {
        return 0;
    };

    let part = |i: usize| -> u64 { caps.get(i).map_or(0, |m| m.as_str().parse().unwrap_or(0)) };

    part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3))
}

/// Formats a duration in seconds as "H:MM:SS" or "M:SS".
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;

    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
