//! Monthly popularity counters.

use std::fmt;
use std::str::FromStr;

use crate::{error::Result, BookId, Error, Timestamp};
use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default number of entries returned by a ranking query.
pub const DEFAULT_RANKING_LIMIT: usize = 10;

/// Maximum number of entries returned by a ranking query.
pub const MAX_RANKING_LIMIT: usize = 100;

/// Clamp a requested ranking size into the supported range.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .map(|l| l.clamp(1, MAX_RANKING_LIMIT))
        .unwrap_or(DEFAULT_RANKING_LIMIT)
}

/// A calendar month, keyed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!("month out of range: {}", month)));
        }
        if !(0..=9999).contains(&year) {
            return Err(Error::Validation(format!("year out of range: {}", year)));
        }
        Ok(Self { year, month })
    }

    /// The month containing `at` (UTC).
    pub fn of(at: Timestamp) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("invalid month '{}', expected YYYY-MM", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Month::new(year, month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Borrow counter for one book in one month.
///
/// Only ever incremented; returns never reduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRanking {
    pub month: Month,
    pub book_id: BookId,
    pub borrow_count: u64,
}

impl MonthlyRanking {
    /// Counter created by the first borrow of the month.
    pub fn first(month: Month, book_id: BookId) -> Self {
        Self {
            month,
            book_id,
            borrow_count: 1,
        }
    }

    pub fn record_borrow(&mut self) {
        self.borrow_count += 1;
    }
}
