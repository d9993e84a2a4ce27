use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Upstream instant pinned to UTC.
///
/// Display-zone rendering lives in [`crate::TimestampNormalizer`]; this type
/// never carries any other offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Rfc3339Instant", into = "Rfc3339Instant")]
pub struct UtcDateTime(OffsetDateTime);

#[derive(Serialize, Deserialize)]
struct Rfc3339Instant(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl From<Rfc3339Instant> for UtcDateTime {
    fn from(value: Rfc3339Instant) -> Self {
        Self::from_offset_datetime(value.0)
    }
}

impl From<UtcDateTime> for Rfc3339Instant {
    fn from(value: UtcDateTime) -> Self {
        Self(value.0)
    }
}

impl UtcDateTime {
    /// Parses RFC 3339 with any offset.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(Self::from_offset_datetime)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    /// Chart API timestamps are unix seconds.
    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        match OffsetDateTime::from_unix_timestamp(seconds) {
            Ok(instant) => Ok(Self(instant)),
            Err(_) => Err(ValidationError::InvalidTimestamp {
                value: seconds.to_string(),
            }),
        }
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn format_rfc3339(self) -> String {
        match self.0.format(&Rfc3339) {
            Ok(text) => text,
            Err(_) => self.unix_timestamp().to_string(),
        }
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}
