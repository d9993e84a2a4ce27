//! Timestamp normalization into the fixed display zone.

use std::sync::Arc;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::clock::{Clock, SystemClock};
use crate::{UtcDateTime, ValidationError};

/// Display zone used when none is configured (India Standard Time).
pub const DEFAULT_DISPLAY_OFFSET: UtcOffset = offset!(+05:30);

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const NAIVE_DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Literal that is not a strict `YYYY-MM-DD` date or a supported timestamp.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("invalid timestamp '{value}', expected RFC3339 or YYYY-MM-DDTHH:MM:SS")]
    InvalidTimestamp { value: String },
}

/// Converts instants into the display zone and owns the notion of "now".
#[derive(Clone)]
pub struct TimestampNormalizer {
    offset: UtcOffset,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TimestampNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampNormalizer")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_OFFSET, Arc::new(SystemClock))
    }
}

impl TimestampNormalizer {
    pub fn new(offset: UtcOffset, clock: Arc<dyn Clock>) -> Self {
        Self { offset, clock }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn to_display_zone(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.offset)
    }

    /// Zone-naive values are interpreted as UTC.
    pub fn naive_to_display_zone(&self, naive: PrimitiveDateTime) -> OffsetDateTime {
        self.to_display_zone(naive.assume_utc())
    }

    pub fn utc_to_display_zone(&self, instant: UtcDateTime) -> OffsetDateTime {
        self.to_display_zone(instant.into_inner())
    }

    /// Accepts RFC3339 (any offset) or naive `YYYY-MM-DDTHH:MM:SS` treated as UTC.
    pub fn parse_timestamp(&self, input: &str) -> Result<OffsetDateTime, ParseError> {
        let trimmed = input.trim();
        if let Ok(zoned) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Ok(self.to_display_zone(zoned));
        }

        PrimitiveDateTime::parse(trimmed, NAIVE_DATETIME_FORMAT)
            .map(|naive| self.naive_to_display_zone(naive))
            .map_err(|_| ParseError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    /// Strict `YYYY-MM-DD`: exactly ten characters, zero padded, no whitespace.
    pub fn parse_date_only(&self, input: &str) -> Result<Date, ParseError> {
        let invalid = || ParseError::InvalidDate {
            value: input.to_owned(),
        };

        let bytes = input.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(index, byte)| match index {
                4 | 7 => *byte == b'-',
                _ => byte.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(invalid());
        }

        Date::parse(input, DATE_FORMAT).map_err(|_| invalid())
    }

    pub fn now(&self) -> OffsetDateTime {
        self.to_display_zone(self.clock.now_utc())
    }

    /// Calendar date of [`Self::now`] in the display zone.
    pub fn today(&self) -> Date {
        self.now().date()
    }

    pub fn format_timestamp(&self, instant: OffsetDateTime) -> String {
        let zoned = self.to_display_zone(instant);
        zoned
            .format(&Rfc3339)
            .unwrap_or_else(|_| zoned.unix_timestamp().to_string())
    }

    pub fn format_date(&self, date: Date) -> String {
        date.format(DATE_FORMAT)
            .unwrap_or_else(|_| date.to_string())
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `Z` or `UTC` into an offset.
pub fn parse_offset(input: &str) -> Result<UtcOffset, ValidationError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    UtcOffset::parse(trimmed, OFFSET_FORMAT).map_err(|_| ValidationError::InvalidOffset {
        value: input.to_owned(),
    })
}
