//! # Domain Models
//!
//! Canonical domain types for indexgate.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`IndexDefinition`] | Public index code, upstream symbol and display name |
//! | [`Bar`] | OHLCV bar with UTC timestamp |
//! | [`BarSeries`] | Collection of bars returned by one upstream call |
//! | [`RealtimeSnapshot`] | Latest bar for a symbol plus the tier that produced it |
//! | [`HistoricalBar`] | Daily row dated in the display zone |
//! | [`Symbol`] | Validated upstream ticker |
//! | [`Interval`] | Bar granularity (1m, 1d) |
//! | [`UtcDateTime`] | UTC instant |

mod interval;
mod models;
mod symbol;
mod timestamp;

pub use interval::Interval;
pub use models::{
    Bar, BarSeries, HistoricalBar, IndexDefinition, RealtimeSnapshot, SnapshotStatus,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
