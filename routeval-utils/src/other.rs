//! Module containing some utility functions that didn't fit anywhere else.

use time::{format_description, OffsetDateTime};

/// Produces a timestamp `String` of the current time in YYYY-MM-DD_HH-mm-SS format.
///
/// Falls back to UTC if the local offset cannot be determined, and to the unix timestamp if the
/// format cannot be applied.
pub fn get_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_description::parse("[year]-[month]-[day]_[hour]-[minute]-[second]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string())
}

/// Turns a (possibly fractional) number into a token that is safe to use in file names, e.g.
/// `12.5` becomes `12.5` and `-0.25` becomes `m0.25`.
pub fn file_name_token(x: f64) -> String {
    let s = x.to_string();
    match s.strip_prefix('-') {
        Some(abs) => format!("m{abs}"),
        None => s,
    }
}
