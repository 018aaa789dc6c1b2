//! String-to-typed conversions applied at the Bronze/Silver boundary.
//!
//! Every coercion is total: malformed input yields `None` and the caller
//! decides whether that rejects the row or just nulls the value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Money, StateCode};

/// Default timestamp layout of the marketplace export.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tried in order after the configured format.
const FALLBACK_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

static STATE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?(\d+)(?:\.(\d*))?$|^\+?\.(\d+)$").unwrap());

/// Parse a timestamp cell.
///
/// Tries `format`, then a few ISO-like fallbacks (fractional seconds, a
/// trailing `Z`), then RFC 3339 with an offset (converted to UTC), then a
/// bare date (midnight).
pub fn parse_timestamp(raw: Option<&str>, format: &str) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let local = raw.strip_suffix('Z').unwrap_or(raw);

    std::iter::once(format)
        .chain(FALLBACK_TIMESTAMP_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDateTime::parse_from_str(local, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a non-negative decimal amount into exact cents.
///
/// Digits past the second fractional place round half-up. Negative,
/// empty, and non-numeric input yields `None`, as does anything above
/// [`Money::MAX`].
pub fn parse_money(raw: Option<&str>) -> Option<Money> {
    let raw = raw?.trim();
    let caps = DECIMAL.captures(raw)?;

    let (int_part, frac_part) = match (caps.get(1), caps.get(3)) {
        (Some(int), _) => (int.as_str(), caps.get(2).map_or("", |m| m.as_str())),
        (None, Some(frac)) => ("0", frac.as_str()),
        (None, None) => return None,
    };

    let whole: i64 = int_part.parse().ok()?;
    let mut frac_digits = frac_part.bytes().map(|b| i64::from(b - b'0'));
    let tenths = frac_digits.next().unwrap_or(0);
    let hundredths = frac_digits.next().unwrap_or(0);
    let round_up = frac_digits.next().is_some_and(|d| d >= 5);

    let cents = whole
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))?;
    let money = Money::from_cents(cents);
    (money <= Money::MAX).then_some(money)
}

/// Parse an item sequence number. Accepts integral floats like `"2.0"`.
pub fn parse_sequence(raw: Option<&str>) -> Option<u32> {
    let raw = raw?.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let (int, frac) = raw.split_once('.')?;
    if !frac.is_empty() && frac.bytes().all(|b| b == b'0') {
        int.parse().ok()
    } else {
        None
    }
}

/// Canonicalize a state code: trim, uppercase, require two ASCII letters.
pub fn normalize_state(raw: Option<&str>) -> Option<StateCode> {
    let code = raw?.trim().to_uppercase();
    STATE_CODE
        .is_match(&code)
        .then(|| StateCode::new_unchecked(code))
}

/// Trim and uppercase free text, dropping it when nothing is left.
pub fn normalize_upper(raw: Option<&str>) -> Option<String> {
    let text = raw?.trim();
    (!text.is_empty()).then(|| text.to_uppercase())
}

/// Trim a key column; blank keys count as null.
pub fn normalize_key(raw: Option<&str>) -> Option<String> {
    let key = raw?.trim();
    (!key.is_empty()).then(|| key.to_string())
}
