//! Upstream market-data capability.
//!
//! The gateway depends on its provider only through [`MarketDataSource`].
//! Every call returns an ordered [`BarSeries`], possibly empty, or a
//! classified [`SourceError`].
//!
//! | Method | Granularity | Window |
//! |--------|-------------|--------|
//! | [`fetch_intraday`](MarketDataSource::fetch_intraday) | 1m | current session |
//! | [`fetch_daily`](MarketDataSource::fetch_daily) | 1d | trailing `lookback_days` |
//! | [`fetch_range`](MarketDataSource::fetch_range) | 1d | `[start, end)` |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use time::Date;

use crate::{BarSeries, Symbol};

/// Boxed future returned by upstream calls.
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    Timeout,
    InvalidRequest,
    Internal,
}

/// Classified upstream failure. Retryability follows from the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Transient failures a later refresh may recover from.
    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Unavailable | SourceErrorKind::RateLimited | SourceErrorKind::Timeout
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Upstream provider contract.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// request the gateway serves.
pub trait MarketDataSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Minute bars for the current trading session.
    fn fetch_intraday<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a>;

    /// Daily bars covering the trailing `lookback_days`.
    fn fetch_daily<'a>(&'a self, symbol: &'a Symbol, lookback_days: u32) -> SourceFuture<'a>;

    /// Daily bars in `[start, end_exclusive)`; `None` start means the
    /// provider's earliest available data.
    fn fetch_range<'a>(
        &'a self,
        symbol: &'a Symbol,
        start: Option<Date>,
        end_exclusive: Date,
    ) -> SourceFuture<'a>;
}
