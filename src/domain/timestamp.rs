//! Timestamp helpers shared by the persisted entities.
//!
//! Timestamps are stored as fixed-width RFC 3339 text with microsecond
//! precision, so lexical order in SQL matches chronological order.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

/// Current time truncated to the precision kept in storage.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a timestamp for a TEXT column.
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a timestamp from a TEXT column.
///
/// Accepts RFC 3339 and the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form that
/// older databases restored from backup may still contain (read as UTC).
pub fn from_db(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

/// Timestamp for a mutation of a row created at `created_at`.
///
/// Never earlier than `created_at`, even if the wall clock stepped back.
pub fn touch(created_at: &DateTime<Utc>) -> DateTime<Utc> {
    std::cmp::max(now(), *created_at)
}
