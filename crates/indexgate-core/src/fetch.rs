//! Tiered upstream fetch strategy.
//!
//! | Tier | Upstream call | Outcome on non-empty |
//! |------|---------------|----------------------|
//! | 1 | `fetch_intraday` (latest session's 1m bars) | last bar, `live` |
//! | 2 | `fetch_daily(symbol, 5)` | last bar, `stale-fallback` |
//! | 3 | none | [`Unavailable::Empty`] |
//!
//! Any failed call ends the walk with [`Unavailable::Upstream`]. Tiers are
//! never retried inside one invocation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::data_source::{MarketDataSource, SourceError, SourceFuture};
use crate::normalizer::TimestampNormalizer;
use crate::range::ResolvedRange;
use crate::{Bar, BarSeries, HistoricalBar, RealtimeSnapshot, SnapshotStatus, Symbol};

/// Trailing window requested by the daily fallback tier.
pub const DAILY_FALLBACK_LOOKBACK_DAYS: u32 = 5;

/// Default bound on a single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the strategy could not produce data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Unavailable {
    #[error("upstream returned no bars for {symbol}")]
    Empty { symbol: Symbol },
    #[error("upstream returned no bars for {symbol} in the requested range")]
    NoDataInRange { symbol: Symbol },
    #[error("upstream call for {symbol} failed: {error}")]
    Upstream { symbol: Symbol, error: SourceError },
}

impl Unavailable {
    /// `true` when upstream answered but had no rows.
    pub const fn is_empty_result(&self) -> bool {
        matches!(self, Self::Empty { .. } | Self::NoDataInRange { .. })
    }
}

/// Walks the fetch tiers against one upstream source.
#[derive(Clone)]
pub struct TieredFetchStrategy {
    source: Arc<dyn MarketDataSource>,
    timestamps: TimestampNormalizer,
    timeout: Duration,
}

impl std::fmt::Debug for TieredFetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredFetchStrategy")
            .field("source", &self.source.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TieredFetchStrategy {
    pub fn new(source: Arc<dyn MarketDataSource>, timestamps: TimestampNormalizer) -> Self {
        Self {
            source,
            timestamps,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch_realtime(&self, symbol: &Symbol) -> Result<RealtimeSnapshot, Unavailable> {
        let intraday = self
            .bounded("intraday", self.source.fetch_intraday(symbol))
            .await
            .map_err(|error| self.upstream_failure(symbol, "intraday", error))?;

        // On non-trading days the intraday call still answers with the last
        // session's bars; those are served as live.
        if let Some(bar) = intraday.bars.iter().max_by_key(|bar| bar.ts) {
            return Ok(self.snapshot(symbol, bar, SnapshotStatus::Live));
        }

        tracing::debug!(%symbol, "no intraday bars, falling back to daily bars");

        let daily = self
            .bounded(
                "daily",
                self.source
                    .fetch_daily(symbol, DAILY_FALLBACK_LOOKBACK_DAYS),
            )
            .await
            .map_err(|error| self.upstream_failure(symbol, "daily", error))?;

        match daily.bars.iter().max_by_key(|bar| bar.ts) {
            Some(bar) => Ok(self.snapshot(symbol, bar, SnapshotStatus::StaleFallback)),
            None => {
                tracing::warn!(%symbol, source = self.source.name(), "upstream returned no realtime data");
                Err(Unavailable::Empty {
                    symbol: symbol.clone(),
                })
            }
        }
    }

    /// Daily rows dated in the display zone, trimmed to the window and
    /// sorted ascending.
    pub async fn fetch_historical(
        &self,
        symbol: &Symbol,
        range: &ResolvedRange,
    ) -> Result<Vec<HistoricalBar>, Unavailable> {
        let series = self
            .bounded(
                "range",
                self.source
                    .fetch_range(symbol, range.start_inclusive, range.end_exclusive),
            )
            .await
            .map_err(|error| self.upstream_failure(symbol, "range", error))?;

        let mut rows: Vec<HistoricalBar> = series
            .bars
            .iter()
            .map(|bar| HistoricalBar {
                date: self.timestamps.utc_to_display_zone(bar.ts).date(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .filter(|row| range.contains(row.date))
            .collect();
        rows.sort_by_key(|row| row.date);

        if rows.is_empty() {
            tracing::warn!(
                %symbol,
                start = ?range.start_inclusive,
                end_exclusive = %range.end_exclusive,
                "upstream returned no bars in range"
            );
            return Err(Unavailable::NoDataInRange {
                symbol: symbol.clone(),
            });
        }

        Ok(rows)
    }

    async fn bounded(
        &self,
        tier: &'static str,
        call: SourceFuture<'_>,
    ) -> Result<BarSeries, SourceError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::timeout(format!(
                "{} {tier} call exceeded {}ms",
                self.source.name(),
                self.timeout.as_millis()
            ))),
        }
    }

    fn upstream_failure(&self, symbol: &Symbol, tier: &'static str, error: SourceError) -> Unavailable {
        tracing::error!(
            %symbol,
            tier,
            source = self.source.name(),
            code = error.code(),
            retryable = error.retryable(),
            error = error.message(),
            "upstream call failed"
        );
        Unavailable::Upstream {
            symbol: symbol.clone(),
            error,
        }
    }

    fn snapshot(&self, symbol: &Symbol, bar: &Bar, status: SnapshotStatus) -> RealtimeSnapshot {
        RealtimeSnapshot {
            symbol: symbol.clone(),
            timestamp: self.timestamps.utc_to_display_zone(bar.ts),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            status,
        }
    }
}
