//! UTC timestamp helpers
//!
//! Stored timestamps are `DateTime<Utc>`. Values arriving with an explicit
//! offset are accepted only when that offset is zero.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::{StreamError, StreamResult};

/// Convert an offset-carrying timestamp to UTC, rejecting non-UTC offsets
///
/// # Errors
///
/// Returns `InvalidArgument` if the offset is not zero.
pub fn require_utc(timestamp: DateTime<FixedOffset>, what: &str) -> StreamResult<DateTime<Utc>> {
    if timestamp.offset().local_minus_utc() != 0 {
        return Err(StreamError::invalid_argument(format!(
            "{} must be in UTC, got offset {}",
            what,
            timestamp.offset()
        )));
    }
    Ok(timestamp.with_timezone(&Utc))
}

/// Parse an RFC 3339 timestamp that must be in UTC
///
/// # Errors
///
/// Returns `InvalidArgument` if the text does not parse or is not UTC.
pub fn parse_utc(text: &str, what: &str) -> StreamResult<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
        StreamError::invalid_argument(format!("{} '{}' is not RFC 3339: {}", what, text, e))
    })?;
    require_utc(parsed, what)
}
