use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

/// Public index exposed by the gateway and the upstream ticker backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub code: String,
    pub upstream_symbol: Symbol,
    pub display_name: String,
}

impl IndexDefinition {
    pub fn new(
        code: impl AsRef<str>,
        upstream_symbol: &str,
        display_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            code: validate_index_code(code.as_ref())?,
            upstream_symbol: Symbol::parse(upstream_symbol)?,
            display_name: display_name.into(),
        })
    }
}

/// OHLCV bar record for a given interval.
///
/// High/low ordering is trusted from upstream; only finiteness and sign are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Series wrapper returned by every upstream call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub symbol: Symbol,
    pub interval: Interval,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: Symbol, interval: Interval, bars: Vec<Bar>) -> Self {
        Self {
            symbol,
            interval,
            bars,
        }
    }

    pub fn empty(symbol: Symbol, interval: Interval) -> Self {
        Self::new(symbol, interval, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

/// Which fetch tier produced a realtime snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotStatus {
    Live,
    StaleFallback,
}

impl SnapshotStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::StaleFallback => "stale-fallback",
        }
    }
}

impl Display for SnapshotStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest bar for one upstream symbol, timestamped in the display zone.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSnapshot {
    pub symbol: Symbol,
    pub timestamp: OffsetDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub status: SnapshotStatus,
}

/// One daily row of a historical series, dated in the display zone.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalBar {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

fn validate_index_code(input: &str) -> Result<String, ValidationError> {
    let code = input.trim();
    if code.is_empty() {
        return Err(ValidationError::EmptyIndexCode);
    }

    let is_valid = code
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit());
    if !is_valid {
        return Err(ValidationError::InvalidIndexCode {
            code: input.to_owned(),
        });
    }

    Ok(code.to_owned())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
