//! Historical query window normalization.
//!
//! Turns the optional `start`/`end` literals of a historical request into a
//! half-open `[start_inclusive, end_exclusive)` date window. The requested end
//! date is made inclusive by moving the exclusive bound to the following day.

use std::fmt::{Display, Formatter};

use thiserror::Error;
use time::{Date, Duration};

use crate::normalizer::{ParseError, TimestampNormalizer};

/// Longest window a single historical query may span.
pub const MAX_RANGE_DAYS: i64 = 1825;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeErrorKind {
    InvalidFormat,
    OrderInvalid,
    RangeTooLarge,
}

impl RangeErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::OrderInvalid => "order_invalid",
            Self::RangeTooLarge => "range_too_large",
        }
    }
}

impl Display for RangeErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RangeError {
    kind: RangeErrorKind,
    message: String,
}

impl RangeError {
    fn invalid_format(error: ParseError) -> Self {
        Self {
            kind: RangeErrorKind::InvalidFormat,
            message: error.to_string(),
        }
    }

    fn order_invalid(start: Date, end_exclusive: Date) -> Self {
        Self {
            kind: RangeErrorKind::OrderInvalid,
            message: format!(
                "start date {start} is after end date {}",
                end_exclusive.previous_day().unwrap_or(end_exclusive)
            ),
        }
    }

    fn too_large(days: i64) -> Self {
        Self {
            kind: RangeErrorKind::RangeTooLarge,
            message: format!("requested range spans {days} days, maximum is {MAX_RANGE_DAYS}"),
        }
    }

    pub const fn kind(&self) -> RangeErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Canonical historical window. `start_inclusive` is `None` when the caller
/// left it open and the upstream's earliest available data applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start_inclusive: Option<Date>,
    pub end_exclusive: Date,
}

impl ResolvedRange {
    pub fn contains(&self, date: Date) -> bool {
        let after_start = self.start_inclusive.map_or(true, |start| date >= start);
        after_start && date < self.end_exclusive
    }

    pub fn span_days(&self) -> Option<i64> {
        self.start_inclusive
            .map(|start| (self.end_exclusive - start).whole_days())
    }
}

/// Pure range normalizer; "today" comes from the normalizer's clock.
#[derive(Debug, Clone)]
pub struct RangeNormalizer {
    timestamps: TimestampNormalizer,
}

impl RangeNormalizer {
    pub fn new(timestamps: TimestampNormalizer) -> Self {
        Self { timestamps }
    }

    /// Empty strings are treated the same as absent parameters.
    pub fn normalize(
        &self,
        raw_start: Option<&str>,
        raw_end: Option<&str>,
    ) -> Result<ResolvedRange, RangeError> {
        let start = self.parse_optional(raw_start)?;
        let end = match self.parse_optional(raw_end)? {
            Some(end) => end,
            None => self.timestamps.today(),
        };

        let end_exclusive = end.saturating_add(Duration::DAY);

        if let Some(start) = start {
            if start > end_exclusive {
                return Err(RangeError::order_invalid(start, end_exclusive));
            }

            let days = (end_exclusive - start).whole_days();
            if days > MAX_RANGE_DAYS {
                return Err(RangeError::too_large(days));
            }
        }

        Ok(ResolvedRange {
            start_inclusive: start,
            end_exclusive,
        })
    }

    fn parse_optional(&self, raw: Option<&str>) -> Result<Option<Date>, RangeError> {
        match raw {
            None | Some("") => Ok(None),
            Some(value) => self
                .timestamps
                .parse_date_only(value)
                .map(Some)
                .map_err(RangeError::invalid_format),
        }
    }
}
