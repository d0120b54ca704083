//! Compact duration strings used in configuration: `30m`, `4h`, `90d`.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([mhd])$").expect("valid duration regex"));

pub fn parse_duration(input: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidDuration(input.to_string());

    let captures = DURATION_PATTERN.captures(input.trim()).ok_or_else(invalid)?;
    let amount: u64 = captures[1].parse().map_err(|_| invalid())?;
    let unit_secs = match &captures[2] {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Inverse of [`parse_duration`], using the largest whole unit.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs != 0 && secs % (24 * 60 * 60) == 0 {
        format!("{}d", secs / (24 * 60 * 60))
    } else if secs != 0 && secs % (60 * 60) == 0 {
        format!("{}h", secs / (60 * 60))
    } else {
        format!("{}m", secs / 60)
    }
}
