//! Delivery identifiers
//!
//! Every delivery gets a composite identifier: the day it was issued on followed by a
//! per-day sequence, `YYYYMMDD-NNN`

use core::fmt;
use core::str::FromStr;

use chrono::Datelike;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

/// Highest sequence that still fits in three digits
pub const MAX_SEQUENCE: u32 = 999;

/// Format of the day prefix
const DAY_FORMAT: &str = "%Y%m%d";

/// Identifier allocation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The day can not be written as `YYYYMMDD`
    #[error("Day out of range: {0}")]
    DayOutOfRange(NaiveDate),

    /// All sequences of the day are used
    #[error("No identifiers left for {0}")]
    Exhausted(NaiveDate),

    /// The latest sequence of the day could not be looked up
    #[error("Could not look up latest identifier: {0}")]
    Lookup(String),
}

/// Composite delivery identifier
///
/// Ordering follows the textual representation: by day, then by sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId {
    /// Day the delivery was issued on
    day: NaiveDate,

    /// Sequence within the day, starting at 1
    sequence: u32,
}

impl DeliveryId {
    /// Create an identifier from its parts
    pub fn new(day: NaiveDate, sequence: u32) -> Result<Self, AllocationError> {
        if !(1..=9999).contains(&day.year()) {
            return Err(AllocationError::DayOutOfRange(day));
        }

        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(AllocationError::Exhausted(day));
        }

        Ok(Self { day, sequence })
    }

    /// Day the delivery was issued on
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Sequence within the day
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{:03}", self.day.format(DAY_FORMAT), self.sequence)
    }
}

/// Parse errors of a textual delivery identifier
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid delivery ID: {0}")]
pub struct ParseDeliveryIdError(String);

impl FromStr for DeliveryId {
    type Err = ParseDeliveryIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDeliveryIdError(value.to_string());

        let (prefix, suffix) = value.split_once('-').ok_or_else(invalid)?;

        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|byte| byte.is_ascii_digit())
        };

        if !all_digits(prefix, 8) || !all_digits(suffix, 3) {
            return Err(invalid());
        }

        let day = NaiveDate::parse_from_str(prefix, DAY_FORMAT).map_err(|_| invalid())?;
        let sequence = suffix.parse::<u32>().map_err(|_| invalid())?;

        Self::new(day, sequence).map_err(|_| invalid())
    }
}

impl Serialize for DeliveryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeliveryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Allocate the identifier following the latest one of the day
///
/// Without a latest sequence the day starts at `001`
pub fn next_id(day: NaiveDate, latest_sequence: Option<u32>) -> Result<DeliveryId, AllocationError> {
    let sequence = match latest_sequence {
        None => 1,
        Some(latest) if latest >= MAX_SEQUENCE => return Err(AllocationError::Exhausted(day)),
        Some(latest) => latest + 1,
    };

    DeliveryId::new(day, sequence)
}

/// Latest sequence used on a day among the given identifiers
pub fn latest_sequence<'a, I>(day: NaiveDate, ids: I) -> Option<u32>
where
    I: IntoIterator<Item = &'a DeliveryId>,
{
    ids.into_iter()
        .filter(|id| id.day == day)
        .max()
        .map(DeliveryId::sequence)
}
