//! Backup and safety-copy file names.
//!
//! Backups are named `<prefix>_YYYYMMDD_HHMMSS.db`; a second backup within
//! the same second gets a counter, `<prefix>_YYYYMMDD_HHMMSS_2.db`. Parsing
//! is an allow-list: anything else (path separators, other extensions,
//! impossible dates) is rejected.

use chrono::{NaiveDateTime, Timelike};
use std::cmp::Ordering;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const EXTENSION: &str = ".db";

/// A parsed backup file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupName {
    prefix: String,
    timestamp: NaiveDateTime,
    counter: Option<u32>,
}

impl BackupName {
    /// Build a name; `timestamp` is truncated to whole seconds.
    /// `counter` values below 2 mean "no counter".
    pub fn new(prefix: &str, timestamp: NaiveDateTime, counter: Option<u32>) -> Self {
        Self {
            prefix: prefix.to_string(),
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            counter: counter.filter(|n| *n >= 2),
        }
    }

    /// Parse `filename` as a backup taken with `prefix`.
    pub fn parse(prefix: &str, filename: &str) -> Option<Self> {
        let rest = filename
            .strip_prefix(prefix)?
            .strip_prefix('_')?
            .strip_suffix(EXTENSION)?;
        let (timestamp, counter) = parse_stamp(rest)?;
        Some(Self {
            prefix: prefix.to_string(),
            timestamp,
            counter,
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}{}",
            self.prefix,
            stamp(self.timestamp, self.counter),
            EXTENSION
        )
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Position among backups taken in the same second, starting at 1.
    pub fn sequence(&self) -> u32 {
        self.counter.unwrap_or(1)
    }
}

impl Ord for BackupName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.sequence().cmp(&other.sequence()))
            .then_with(|| self.prefix.cmp(&other.prefix))
    }
}

impl PartialOrd for BackupName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Name of the copy taken of `db_file_name` right before a restore:
/// `<db_file_name>.backup_YYYYMMDD_HHMMSS[_N]`.
pub fn safety_copy_name(
    db_file_name: &str,
    timestamp: NaiveDateTime,
    counter: Option<u32>,
) -> String {
    format!(
        "{}.backup_{}",
        db_file_name,
        stamp(timestamp, counter.filter(|n| *n >= 2))
    )
}

fn stamp(timestamp: NaiveDateTime, counter: Option<u32>) -> String {
    let base = timestamp.format(TIMESTAMP_FORMAT).to_string();
    match counter {
        Some(n) => format!("{}_{}", base, n),
        None => base,
    }
}

fn parse_stamp(s: &str) -> Option<(NaiveDateTime, Option<u32>)> {
    if !s.is_ascii() || s.len() < TIMESTAMP_LEN {
        return None;
    }
    let (stamp, tail) = s.split_at(TIMESTAMP_LEN);
    let shape_ok = stamp.bytes().enumerate().all(|(i, b)| match i {
        8 => b == b'_',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

    let counter = if tail.is_empty() {
        None
    } else {
        let digits = tail.strip_prefix('_')?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let n: u32 = digits.parse().ok()?;
        if n < 2 {
            return None;
        }
        Some(n)
    };

    Some((timestamp, counter))
}
