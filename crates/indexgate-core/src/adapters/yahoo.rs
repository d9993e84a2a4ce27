use std::sync::Arc;

use serde::Deserialize;
use time::{Date, Duration};

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::{MarketDataSource, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::throttling::UpstreamThrottle;
use crate::{Bar, BarSeries, Interval, Symbol, UtcDateTime};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const REFERER: &str = "https://finance.yahoo.com/";
/// 1900-01-01T00:00:00Z, earlier than any chart history.
const EARLIEST_PERIOD_START: i64 = -2_208_988_800;

/// Yahoo Finance v8 chart adapter.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    throttle: Option<UpstreamThrottle>,
    base_url: String,
    timeout_ms: u64,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            throttle: None,
            base_url: String::from(DEFAULT_BASE_URL),
            timeout_ms: 10_000,
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_throttle(mut self, throttle: UpstreamThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    fn chart_request(&self, symbol: &Symbol, interval: Interval, window: ChartWindow) -> HttpRequest {
        let request = HttpRequest::get(format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        ));
        let request = match window {
            ChartWindow::Range(range) => request.with_query("range", range),
            ChartWindow::Period { from, to } => request
                .with_query("period1", from)
                .with_query("period2", to),
        };

        request
            .with_query("interval", interval.as_str())
            .with_header("referer", REFERER)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn fetch_chart(
        &self,
        symbol: &Symbol,
        interval: Interval,
        window: ChartWindow,
    ) -> Result<BarSeries, SourceError> {
        if let Err(cooldown) = self.circuit_breaker.try_acquire() {
            return Err(SourceError::unavailable(format!(
                "yahoo circuit breaker is open; next probe in {}s",
                cooldown.as_secs()
            )));
        }

        if let Some(throttle) = &self.throttle {
            if let Err(wait) = throttle.try_acquire() {
                return Err(SourceError::rate_limited(format!(
                    "upstream call budget exhausted; next slot in {}ms",
                    wait.as_millis()
                )));
            }
        }

        let request = self.chart_request(symbol, interval, window);
        tracing::debug!(%symbol, url = %request.full_url(), "requesting yahoo chart");

        let response = self.http_client.execute(request).await.map_err(|e| {
            self.circuit_breaker.record_failure();
            if e.timed_out() {
                SourceError::timeout(format!("yahoo transport timeout: {}", e.message()))
            } else {
                SourceError::unavailable(format!("yahoo transport error: {}", e.message()))
            }
        })?;

        match response.status {
            200..=299 => {}
            404 => {
                return Err(SourceError::invalid_request(format!(
                    "yahoo does not know symbol '{symbol}'"
                )));
            }
            429 => {
                self.circuit_breaker.record_failure();
                return Err(SourceError::rate_limited("yahoo returned status 429"));
            }
            status => {
                self.circuit_breaker.record_failure();
                return Err(SourceError::unavailable(format!(
                    "yahoo returned status {status}"
                )));
            }
        }

        self.circuit_breaker.record_success();
        parse_chart(&response.body, symbol, interval)
    }
}

impl MarketDataSource for YahooAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn fetch_intraday<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a> {
        Box::pin(async move {
            self.fetch_chart(symbol, Interval::OneMinute, ChartWindow::Range("1d"))
                .await
        })
    }

    fn fetch_daily<'a>(&'a self, symbol: &'a Symbol, lookback_days: u32) -> SourceFuture<'a> {
        Box::pin(async move {
            let window = ChartWindow::Range(lookback_range(lookback_days));
            self.fetch_chart(symbol, Interval::OneDay, window).await
        })
    }

    fn fetch_range<'a>(
        &'a self,
        symbol: &'a Symbol,
        start: Option<Date>,
        end_exclusive: Date,
    ) -> SourceFuture<'a> {
        Box::pin(async move {
            // Pad by a day on both sides; callers trim to the exact window in
            // the display zone. `range=max` may coarsen long histories, so an
            // open start still sends explicit bounds.
            let window = ChartWindow::Period {
                from: start.map_or(EARLIEST_PERIOD_START, |start| {
                    utc_midnight(start.saturating_sub(Duration::DAY))
                }),
                to: utc_midnight(end_exclusive.saturating_add(Duration::DAY)),
            };
            self.fetch_chart(symbol, Interval::OneDay, window).await
        })
    }
}

/// Either a named trailing range or explicit epoch-second bounds.
#[derive(Debug, Clone, Copy)]
enum ChartWindow {
    Range(&'static str),
    Period { from: i64, to: i64 },
}

fn lookback_range(lookback_days: u32) -> &'static str {
    match lookback_days {
        0..=1 => "1d",
        2..=5 => "5d",
        6..=31 => "1mo",
        _ => "3mo",
    }
}

fn utc_midnight(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

// ============================================================================
// Chart response parsing
// ============================================================================

/// `{"chart": {"result": [...], "error": ...}}`
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartFrame>>,
    error: Option<ChartFault>,
}

#[derive(Debug, Deserialize)]
struct ChartFault {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartFrame {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default, rename = "quote")]
    quotes: Vec<QuoteColumns>,
}

/// Column-oriented OHLCV arrays, index-aligned with `timestamp`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

impl QuoteColumns {
    /// `[open, high, low, close]` at `row`, if every price is present.
    fn prices(&self, row: usize) -> Option<[f64; 4]> {
        let cell = |column: &[Option<f64>]| column.get(row).copied().flatten();
        Some([
            cell(&self.open)?,
            cell(&self.high)?,
            cell(&self.low)?,
            cell(&self.close)?,
        ])
    }

    /// Missing or negative volume counts as zero.
    fn volume(&self, row: usize) -> u64 {
        self.volume
            .get(row)
            .copied()
            .flatten()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0)
    }
}

/// Decodes a chart payload into ascending bars. A frame without timestamps
/// is an empty series; rows missing any price are dropped.
fn parse_chart(body: &str, symbol: &Symbol, interval: Interval) -> Result<BarSeries, SourceError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(fault) = envelope.chart.error {
        return Err(SourceError::unavailable(format!(
            "yahoo chart API error: {} {}",
            fault.code,
            fault.description.unwrap_or_default()
        )));
    }

    let frame = envelope
        .chart
        .result
        .and_then(|frames| frames.into_iter().next());
    let Some((timestamps, columns)) = frame.and_then(|frame| {
        let columns = frame.indicators.quotes.into_iter().next().unwrap_or_default();
        frame.timestamp.map(|timestamps| (timestamps, columns))
    }) else {
        return Ok(BarSeries::empty(symbol.clone(), interval));
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (row, &seconds) in timestamps.iter().enumerate() {
        let Some([open, high, low, close]) = columns.prices(row) else {
            continue;
        };
        let ts = UtcDateTime::from_unix_timestamp(seconds)
            .map_err(|e| SourceError::internal(format!("invalid timestamp: {e}")))?;

        match Bar::new(ts, open, high, low, close, columns.volume(row)) {
            Ok(bar) => bars.push(bar),
            Err(error) => tracing::debug!(%symbol, ts = seconds, %error, "skipping malformed yahoo row"),
        }
    }

    bars.sort_by_key(|bar| bar.ts);
    Ok(BarSeries::new(symbol.clone(), interval, bars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpFuture, HttpResponse};
    use std::sync::Mutex;
    use time::macros::{date, datetime};
    use time::OffsetDateTime;

    fn unix(value: OffsetDateTime) -> i64 {
        value.unix_timestamp()
    }

    #[derive(Debug)]
    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn responding(response: Result<HttpResponse, HttpError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .iter()
                .map(HttpRequest::full_url)
                .collect()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> HttpFuture<'a> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn chart_body() -> String {
        let first = unix(datetime!(2023-01-02 03:45 UTC));
        let second = unix(datetime!(2023-01-03 03:45 UTC));
        let third = unix(datetime!(2023-01-04 03:45 UTC));
        format!(
            r#"{{"chart":{{"result":[{{"meta":{{"symbol":"^NSEI"}},
            "timestamp":[{third},{first},{second}],
            "indicators":{{"quote":[{{
                "open":[18100.5,18000.0,null],
                "high":[18200.0,18100.0,18300.0],
                "low":[18000.0,17950.0,18050.0],
                "close":[18150.0,18050.0,18250.0],
                "volume":[300000,null,250000]
            }}]}}}}],"error":null}}}}"#
        )
    }

    fn symbol() -> Symbol {
        Symbol::parse("^NSEI").expect("valid symbol")
    }

    #[test]
    fn parses_chart_skipping_null_rows_and_sorting() {
        let series = parse_chart(&chart_body(), &symbol(), Interval::OneDay).expect("parse");
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.bars[0].ts.unix_timestamp(), unix(datetime!(2023-01-02 03:45 UTC)));
        assert_eq!(series.bars[0].volume, 0);
        assert_eq!(series.bars[1].close, 18150.0);
        assert_eq!(series.bars[1].volume, 300_000);
    }

    #[test]
    fn result_without_timestamps_is_empty_series() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let series = parse_chart(body, &symbol(), Interval::OneMinute).expect("parse");
        assert!(series.is_empty());
    }

    #[test]
    fn chart_error_object_maps_to_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let error = parse_chart(body, &symbol(), Interval::OneDay).expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("delisted"));
    }

    #[test]
    fn malformed_json_is_internal() {
        let error = parse_chart("<html>", &symbol(), Interval::OneDay).expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::Internal);
    }

    #[test]
    fn lookback_maps_to_yahoo_ranges() {
        assert_eq!(lookback_range(1), "1d");
        assert_eq!(lookback_range(5), "5d");
        assert_eq!(lookback_range(20), "1mo");
        assert_eq!(lookback_range(90), "3mo");
    }

    #[tokio::test]
    async fn tiers_use_expected_chart_queries() {
        let client = Arc::new(RecordingHttpClient::responding(Ok(HttpResponse::ok_json(
            chart_body(),
        ))));
        let adapter = YahooAdapter::with_http_client(client.clone())
            .with_base_url("https://chart.example.test/");
        let symbol = symbol();

        adapter.fetch_intraday(&symbol).await.expect("intraday");
        adapter.fetch_daily(&symbol, 5).await.expect("daily");
        adapter
            .fetch_range(&symbol, Some(date!(2023-01-01)), date!(2023-01-04))
            .await
            .expect("range");
        adapter
            .fetch_range(&symbol, None, date!(2023-01-04))
            .await
            .expect("open range");

        let urls = client.recorded_urls();
        assert_eq!(
            urls[0],
            "https://chart.example.test/v8/finance/chart/%5ENSEI?range=1d&interval=1m"
        );
        assert!(urls[1].ends_with("?range=5d&interval=1d"));
        assert!(urls[2].ends_with(&format!(
            "?period1={}&period2={}&interval=1d",
            unix(datetime!(2022-12-31 00:00 UTC)),
            unix(datetime!(2023-01-05 00:00 UTC))
        )));
        assert!(urls[3].ends_with(&format!(
            "?period1={}&period2={}&interval=1d",
            unix(datetime!(1900-01-01 00:00 UTC)),
            unix(datetime!(2023-01-05 00:00 UTC))
        )));
    }

    #[tokio::test]
    async fn transport_timeout_maps_to_timeout_kind() {
        let client = Arc::new(RecordingHttpClient::responding(Err(HttpError::timeout(
            "deadline elapsed",
        ))));
        let adapter = YahooAdapter::with_http_client(client);

        let error = adapter.fetch_intraday(&symbol()).await.expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::Timeout);
    }

    #[tokio::test]
    async fn circuit_breaker_opens_after_repeated_failures() {
        let client = Arc::new(RecordingHttpClient::responding(Ok(HttpResponse::with_status(
            503, "",
        ))));
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: std::time::Duration::from_secs(60),
        }));
        let adapter =
            YahooAdapter::with_http_client(client.clone()).with_circuit_breaker(breaker.clone());

        for _ in 0..2 {
            let error = adapter.fetch_daily(&symbol(), 5).await.expect_err("503");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let error = adapter.fetch_daily(&symbol(), 5).await.expect_err("blocked");
        assert!(error.message().contains("circuit breaker is open"));
        assert_eq!(client.recorded_urls().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_throttle_fails_fast_without_calling_upstream() {
        let client = Arc::new(RecordingHttpClient::responding(Ok(HttpResponse::ok_json(
            chart_body(),
        ))));
        let adapter = YahooAdapter::with_http_client(client.clone())
            .with_throttle(UpstreamThrottle::per_minute(1));

        adapter.fetch_intraday(&symbol()).await.expect("first call");
        let error = adapter.fetch_intraday(&symbol()).await.expect_err("throttled");
        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
        assert_eq!(client.recorded_urls().len(), 1);
    }

    #[tokio::test]
    async fn unknown_symbol_is_invalid_request_and_does_not_trip_breaker() {
        let client = Arc::new(RecordingHttpClient::responding(Ok(HttpResponse::with_status(
            404,
            r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#,
        ))));
        let adapter = YahooAdapter::with_http_client(client);

        let error = adapter.fetch_intraday(&symbol()).await.expect_err("404");
        assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
        assert_eq!(adapter.circuit_breaker().consecutive_failures(), 0);
    }
}
