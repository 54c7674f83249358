//! Core types for tor-exit-history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One calendar month, the unit of archive fetch and of chronological ordering
///
/// Canonical text form is `YYYY-MM`. Ordering is chronological.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period, returning `None` unless `1 <= month <= 12` and the year has four digits
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (0..=9999).contains(&year) && (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Calendar year
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, 1-based
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::InvalidDateFormat {
            input: s.to_string(),
            reason,
        };

        let (year, month) = s.split_once('-').ok_or_else(|| invalid("expected YYYY-MM"))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid("expected YYYY-MM"));
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("year and month must be digits"));
        }

        let year: i32 = year.parse().map_err(|_| invalid("year is not a number"))?;
        let month: u32 = month.parse().map_err(|_| invalid("month is not a number"))?;
        Period::new(year, month).ok_or_else(|| invalid("month out of range"))
    }
}

impl TryFrom<String> for Period {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// One parsed relay observation from an exit list
///
/// Serialized with the upstream directive names as keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitNodeRecord {
    /// Relay fingerprint, an opaque exact-match key (never empty)
    #[serde(rename = "ExitNode")]
    pub fingerprint: String,

    /// When the relay descriptor was published
    #[serde(rename = "Published")]
    pub published: DateTime<Utc>,

    /// When the relay status was last checked
    #[serde(rename = "LastStatus")]
    pub last_status: DateTime<Utc>,

    /// Exit addresses in the order they appeared in the source
    #[serde(rename = "ExitAddresses")]
    pub exit_addresses: Vec<ExitAddress>,
}

impl ExitNodeRecord {
    /// Start a record for `fingerprint` with no timestamps or addresses yet
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            published: DateTime::<Utc>::UNIX_EPOCH,
            last_status: DateTime::<Utc>::UNIX_EPOCH,
            exit_addresses: Vec::new(),
        }
    }

    /// Whether any exit address equals `ip` exactly (no normalization)
    pub fn has_exit_address(&self, ip: &str) -> bool {
        self.exit_addresses.iter().any(|a| a.ip == ip)
    }
}

/// An IP observed as a relay's egress point at a point in time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitAddress {
    /// The exit IP as written in the source
    #[serde(rename = "ExitAddress")]
    pub ip: String,

    /// When the address was observed
    #[serde(rename = "UpdatedAt")]
    pub updated_at: DateTime<Utc>,
}
