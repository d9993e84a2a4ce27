//! Gateway facade composing registry, normalizers, fetch strategy and cache.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

use crate::adapters::YahooAdapter;
use crate::cache::FreshnessCache;
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::data_source::MarketDataSource;
use crate::fetch::{TieredFetchStrategy, Unavailable};
use crate::normalizer::TimestampNormalizer;
use crate::range::{RangeError, RangeErrorKind, RangeNormalizer};
use crate::registry::{IndexRegistry, InvalidIndex};
use crate::throttling::UpstreamThrottle;
use crate::{HistoricalBar, IndexDefinition, RealtimeSnapshot, SnapshotStatus};

/// Which facade operation produced an upstream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Realtime,
    Historical,
}

/// Facade error taxonomy; every variant maps to one HTTP status and body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("unknown index '{code}'")]
    InvalidIndex { code: String, available: Vec<String> },
    #[error("{message}")]
    InvalidDateFormat { message: String },
    #[error("{message}")]
    RangeOrderInvalid { message: String },
    #[error("{message}")]
    RangeTooLarge { message: String },
    #[error("no data available for '{index}': {message}")]
    UpstreamEmpty {
        index: String,
        operation: Operation,
        message: String,
    },
    #[error("upstream failure for '{index}': {message}")]
    UpstreamFailure {
        index: String,
        operation: Operation,
        message: String,
    },
}

impl GatewayError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidIndex { .. } => "invalid_index",
            Self::InvalidDateFormat { .. } => "invalid_date_format",
            Self::RangeOrderInvalid { .. } => "range_order_invalid",
            Self::RangeTooLarge { .. } => "range_too_large",
            Self::UpstreamEmpty { .. } => "upstream_empty",
            Self::UpstreamFailure { .. } => "upstream_failure",
        }
    }

    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidIndex { .. }
            | Self::InvalidDateFormat { .. }
            | Self::RangeOrderInvalid { .. }
            | Self::RangeTooLarge { .. } => 400,
            Self::UpstreamEmpty {
                operation: Operation::Historical,
                ..
            } => 404,
            Self::UpstreamEmpty { .. } | Self::UpstreamFailure { .. } => 503,
        }
    }

    /// JSON body returned to HTTP callers.
    pub fn body(&self) -> Value {
        match self {
            Self::InvalidIndex { available, .. } => json!({
                "error": "Invalid index",
                "available_indices": available,
            }),
            Self::InvalidDateFormat { message }
            | Self::RangeOrderInvalid { message }
            | Self::RangeTooLarge { message } => json!({ "error": message }),
            Self::UpstreamEmpty {
                index,
                operation: Operation::Historical,
                ..
            } => json!({
                "error": "No data found for given range",
                "index": index,
            }),
            Self::UpstreamEmpty { index, message, .. } => json!({
                "status": "unavailable",
                "index": index,
                "message": message,
            }),
            Self::UpstreamFailure { index, message, .. } => json!({
                "status": "error",
                "index": index,
                "message": message,
            }),
        }
    }

    fn from_unavailable(index: &str, operation: Operation, unavailable: Unavailable) -> Self {
        let message = unavailable.to_string();
        if unavailable.is_empty_result() {
            Self::UpstreamEmpty {
                index: index.to_owned(),
                operation,
                message,
            }
        } else {
            Self::UpstreamFailure {
                index: index.to_owned(),
                operation,
                message,
            }
        }
    }
}

impl From<InvalidIndex> for GatewayError {
    fn from(value: InvalidIndex) -> Self {
        Self::InvalidIndex {
            code: value.code,
            available: value.available,
        }
    }
}

impl From<RangeError> for GatewayError {
    fn from(value: RangeError) -> Self {
        let message = value.message().to_owned();
        match value.kind() {
            RangeErrorKind::InvalidFormat => Self::InvalidDateFormat { message },
            RangeErrorKind::OrderInvalid => Self::RangeOrderInvalid { message },
            RangeErrorKind::RangeTooLarge => Self::RangeTooLarge { message },
        }
    }
}

/// Body of a successful realtime request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimePayload {
    pub index: String,
    pub name: String,
    pub symbol: String,
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub status: SnapshotStatus,
}

/// One dated row of a historical payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalRow {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalPayload {
    pub index: String,
    pub name: String,
    pub data: Vec<HistoricalRow>,
}

/// `{indices: {code: name}}` in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicesPayload {
    #[serde(serialize_with = "serialize_ordered_map")]
    pub indices: Vec<(String, String)>,
}

fn serialize_ordered_map<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (code, name) in pairs {
        map.serialize_entry(code, name)?;
    }
    map.end()
}

struct GatewayInner {
    registry: IndexRegistry,
    timestamps: TimestampNormalizer,
    ranges: RangeNormalizer,
    strategy: TieredFetchStrategy,
    cache: FreshnessCache,
}

/// Entry point for realtime, historical and index-listing queries.
///
/// Cheap to clone; every clone shares the same cache.
#[derive(Clone)]
pub struct IndexGateway {
    inner: Arc<GatewayInner>,
}

impl std::fmt::Debug for IndexGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexGateway")
            .field("indices", &self.inner.registry.codes())
            .field("strategy", &self.inner.strategy)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

impl IndexGateway {
    pub fn new(
        registry: IndexRegistry,
        source: Arc<dyn MarketDataSource>,
        clock: Arc<dyn Clock>,
        config: &GatewayConfig,
    ) -> Self {
        let timestamps = TimestampNormalizer::new(config.display_offset, Arc::clone(&clock));
        let strategy = TieredFetchStrategy::new(source, timestamps.clone())
            .with_timeout(config.upstream_timeout);
        let cache = FreshnessCache::new(clock)
            .with_ttl(config.ttl)
            .with_fallback_ttl(config.fallback_ttl);

        Self {
            inner: Arc::new(GatewayInner {
                registry,
                ranges: RangeNormalizer::new(timestamps.clone()),
                timestamps,
                strategy,
                cache,
            }),
        }
    }

    /// Default registry backed by the Yahoo chart API and the system clock.
    pub fn yahoo(config: &GatewayConfig) -> Self {
        Self::with_yahoo(YahooAdapter::default(), config)
    }

    /// Wires `adapter` with the configured throttle and transport timeout.
    pub fn with_yahoo(adapter: YahooAdapter, config: &GatewayConfig) -> Self {
        let transport_ms = u64::try_from(config.transport_timeout().as_millis()).unwrap_or(u64::MAX);
        let source = adapter
            .with_throttle(UpstreamThrottle::per_minute(config.rate_limit_per_min))
            .with_timeout_ms(transport_ms);

        Self::new(
            IndexRegistry::default(),
            Arc::new(source),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.inner.registry
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.inner.cache
    }

    #[tracing::instrument(name = "get_realtime", skip_all, fields(index = %code))]
    pub async fn get_realtime(&self, code: &str) -> Result<RealtimePayload, GatewayError> {
        let definition = self.inner.registry.resolve(code)?;
        let symbol = &definition.upstream_symbol;

        let snapshot = self
            .inner
            .cache
            .get_or_fetch(symbol, || self.inner.strategy.fetch_realtime(symbol))
            .await
            .map_err(|unavailable| {
                GatewayError::from_unavailable(&definition.code, Operation::Realtime, unavailable)
            })?;

        tracing::debug!(status = %snapshot.status, close = snapshot.close, "realtime snapshot served");
        Ok(self.realtime_payload(definition, &snapshot))
    }

    #[tracing::instrument(name = "get_historical", skip_all, fields(index = %code))]
    pub async fn get_historical(
        &self,
        code: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<HistoricalPayload, GatewayError> {
        let definition = self.inner.registry.resolve(code)?;
        let range = self.inner.ranges.normalize(start, end)?;

        let rows = self
            .inner
            .strategy
            .fetch_historical(&definition.upstream_symbol, &range)
            .await
            .map_err(|unavailable| {
                GatewayError::from_unavailable(&definition.code, Operation::Historical, unavailable)
            })?;

        tracing::debug!(rows = rows.len(), "historical series served");
        Ok(HistoricalPayload {
            index: definition.code.clone(),
            name: definition.display_name.clone(),
            data: rows.iter().map(|row| self.historical_row(row)).collect(),
        })
    }

    pub fn list_indices(&self) -> IndicesPayload {
        IndicesPayload {
            indices: self
                .inner
                .registry
                .list_all()
                .into_iter()
                .map(|(code, name)| (code.to_owned(), name.to_owned()))
                .collect(),
        }
    }

    fn realtime_payload(
        &self,
        definition: &IndexDefinition,
        snapshot: &RealtimeSnapshot,
    ) -> RealtimePayload {
        RealtimePayload {
            index: definition.code.clone(),
            name: definition.display_name.clone(),
            symbol: snapshot.symbol.as_str().to_owned(),
            timestamp: self.inner.timestamps.format_timestamp(snapshot.timestamp),
            open: snapshot.open,
            high: snapshot.high,
            low: snapshot.low,
            close: snapshot.close,
            volume: snapshot.volume,
            status: snapshot.status,
        }
    }

    fn historical_row(&self, bar: &HistoricalBar) -> HistoricalRow {
        HistoricalRow {
            date: self.inner.timestamps.format_date(bar.date),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Date;

    use super::*;
    use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    use crate::clock::ManualClock;
    use crate::data_source::{SourceError, SourceFuture};
    use crate::http_client::{HttpClient, HttpError, HttpFuture, HttpRequest};
    use crate::{Bar, BarSeries, Interval, Symbol, UtcDateTime};

    struct FixedSource {
        intraday: Result<Vec<Bar>, SourceError>,
    }

    impl MarketDataSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fetch_intraday<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a> {
            let result = self
                .intraday
                .clone()
                .map(|bars| BarSeries::new(symbol.clone(), Interval::OneMinute, bars));
            Box::pin(async move { result })
        }

        fn fetch_daily<'a>(&'a self, symbol: &'a Symbol, _lookback_days: u32) -> SourceFuture<'a> {
            let series = BarSeries::empty(symbol.clone(), Interval::OneDay);
            Box::pin(async move { Ok(series) })
        }

        fn fetch_range<'a>(
            &'a self,
            symbol: &'a Symbol,
            _start: Option<Date>,
            _end_exclusive: Date,
        ) -> SourceFuture<'a> {
            let series = BarSeries::empty(symbol.clone(), Interval::OneDay);
            Box::pin(async move { Ok(series) })
        }
    }

    fn gateway(intraday: Result<Vec<Bar>, SourceError>) -> IndexGateway {
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-05 06:00 UTC)));
        IndexGateway::new(
            IndexRegistry::default(),
            Arc::new(FixedSource { intraday }),
            clock,
            &GatewayConfig::default(),
        )
    }

    fn live_bar() -> Bar {
        let ts = UtcDateTime::parse("2024-03-05T05:59:00Z").expect("timestamp");
        Bar::new(ts, 73_900.0, 74_050.5, 73_880.0, 74_001.25, 0).expect("bar")
    }

    #[tokio::test]
    async fn realtime_payload_carries_index_metadata() {
        let payload = gateway(Ok(vec![live_bar()]))
            .get_realtime("Sensex")
            .await
            .expect("payload");

        assert_eq!(payload.index, "sensex");
        assert_eq!(payload.name, "S&P BSE SENSEX");
        assert_eq!(payload.symbol, "^BSESN");
        assert_eq!(payload.timestamp, "2024-03-05T11:29:00+05:30");
        assert_eq!(payload.status, SnapshotStatus::Live);
    }

    #[tokio::test]
    async fn empty_realtime_maps_to_unavailable_body() {
        let error = gateway(Ok(Vec::new()))
            .get_realtime("sensex")
            .await
            .expect_err("empty");

        assert_eq!(error.code(), "upstream_empty");
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.body()["status"], "unavailable");
        assert_eq!(error.body()["index"], "sensex");
    }

    #[tokio::test]
    async fn failed_realtime_maps_to_error_body() {
        let error = gateway(Err(SourceError::unavailable("yahoo returned status 502")))
            .get_realtime("sensex")
            .await
            .expect_err("failure");

        assert_eq!(error.code(), "upstream_failure");
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.body()["status"], "error");
    }

    #[tokio::test]
    async fn empty_historical_range_is_not_found() {
        let error = gateway(Ok(Vec::new()))
            .get_historical("nifty50", Some("2023-01-01"), Some("2023-01-03"))
            .await
            .expect_err("no data");

        assert_eq!(error.status_code(), 404);
        assert_eq!(
            error.body(),
            json!({"error": "No data found for given range", "index": "nifty50"})
        );
    }

    #[tokio::test]
    async fn range_errors_map_to_bad_request() {
        let gateway = gateway(Ok(Vec::new()));

        let error = gateway
            .get_historical("nifty50", Some("2023/01/01"), None)
            .await
            .expect_err("bad format");
        assert_eq!(error.code(), "invalid_date_format");
        assert_eq!(error.status_code(), 400);
        assert!(error.body()["error"].is_string());

        let error = gateway
            .get_historical("nifty50", Some("2020-01-01"), Some("2019-01-01"))
            .await
            .expect_err("order");
        assert_eq!(error.code(), "range_order_invalid");

        let error = gateway
            .get_historical("nifty50", Some("2015-01-01"), Some("2021-01-01"))
            .await
            .expect_err("too large");
        assert_eq!(error.code(), "range_too_large");
    }

    #[test]
    fn indices_serialize_in_registry_order() {
        let payload = gateway(Ok(Vec::new())).list_indices();
        let json = serde_json::to_string(&payload).expect("serialize");
        assert_eq!(
            json,
            r#"{"indices":{"sensex":"S&P BSE SENSEX","nifty50":"NIFTY 50","banknifty":"NIFTY BANK","niftyit":"NIFTY IT","niftynext50":"NIFTY NEXT 50"}}"#
        );
    }

    #[test]
    fn invalid_index_body_lists_available_codes() {
        let error = GatewayError::from(InvalidIndex {
            code: String::from("doge"),
            available: vec![String::from("sensex")],
        });
        assert_eq!(error.status_code(), 400);
        assert_eq!(
            error.body(),
            json!({"error": "Invalid index", "available_indices": ["sensex"]})
        );
    }

    /// Never answers; gives up once the request's own timeout elapses.
    struct StalledHttpClient;

    impl HttpClient for StalledHttpClient {
        fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(request.timeout_ms)).await;
                Err(HttpError::timeout(format!(
                    "request timed out after {}ms",
                    request.timeout_ms
                )))
            })
        }
    }

    #[tokio::test]
    async fn stalled_upstream_is_recorded_by_the_circuit_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: std::time::Duration::from_secs(30),
        }));
        let adapter = YahooAdapter::with_http_client(Arc::new(StalledHttpClient))
            .with_circuit_breaker(Arc::clone(&breaker));
        let config =
            GatewayConfig::default().with_upstream_timeout(std::time::Duration::from_millis(200));
        let gateway = IndexGateway::with_yahoo(adapter, &config);

        let error = gateway.get_realtime("sensex").await.expect_err("stalled");

        assert_eq!(error.status_code(), 503);
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
