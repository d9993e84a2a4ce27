use std::sync::Arc;

use indexgate_core::{
    HttpClient, HttpFuture, HttpRequest, HttpResponse, Interval, MarketDataSource, SourceErrorKind,
    Symbol, YahooAdapter,
};
use time::macros::date;

/// Serves canned chart bodies keyed on the requested interval.
struct FixtureHttpClient {
    status: u16,
    intraday_body: String,
    daily_body: String,
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> HttpFuture<'a> {
        let body = if request.full_url().contains("interval=1m") {
            self.intraday_body.clone()
        } else {
            self.daily_body.clone()
        };
        let response = HttpResponse::with_status(self.status, body);
        Box::pin(async move { Ok(response) })
    }
}

fn chart(timestamps: &[i64], closes: &[Option<f64>]) -> String {
    let ts = timestamps
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let prices = closes
        .iter()
        .map(|close| close.map_or_else(|| String::from("null"), |v| v.to_string()))
        .collect::<Vec<_>>()
        .join(",");
    let volumes = vec!["1000"; timestamps.len()].join(",");
    format!(
        r#"{{"chart":{{"result":[{{"meta":{{}},"timestamp":[{ts}],"indicators":{{"quote":[{{"open":[{prices}],"high":[{prices}],"low":[{prices}],"close":[{prices}],"volume":[{volumes}]}}]}}}}],"error":null}}}}"#
    )
}

#[derive(Clone)]
struct SourceCase {
    name: &'static str,
    source: Arc<dyn MarketDataSource>,
}

fn source_cases() -> Vec<SourceCase> {
    // 2023-01-02..04 09:15 IST, deliberately out of order.
    let daily = chart(
        &[1_672_803_900, 1_672_631_100, 1_672_717_500],
        &[Some(18_042.9), Some(18_197.45), Some(18_232.55)],
    );
    let intraday = chart(
        &[1_672_631_160, 1_672_631_100, 1_672_631_220],
        &[Some(18_120.0), Some(18_110.0), None],
    );

    vec![
        SourceCase {
            name: "yahoo",
            source: Arc::new(YahooAdapter::with_http_client(Arc::new(FixtureHttpClient {
                status: 200,
                intraday_body: intraday,
                daily_body: daily,
            }))),
        },
        SourceCase {
            name: "yahoo-empty",
            source: Arc::new(YahooAdapter::with_http_client(Arc::new(FixtureHttpClient {
                status: 200,
                intraday_body: chart(&[], &[]),
                daily_body: String::from(
                    r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#,
                ),
            }))),
        },
    ]
}

fn sensex() -> Symbol {
    Symbol::parse("^BSESN").expect("valid symbol")
}

#[tokio::test]
async fn every_call_returns_ascending_bars_with_valid_prices() {
    for case in source_cases() {
        let symbol = sensex();
        let calls = [
            (
                Interval::OneMinute,
                case.source.fetch_intraday(&symbol).await,
            ),
            (Interval::OneDay, case.source.fetch_daily(&symbol, 5).await),
            (
                Interval::OneDay,
                case.source
                    .fetch_range(&symbol, Some(date!(2023-01-01)), date!(2023-01-05))
                    .await,
            ),
        ];

        for (interval, result) in calls {
            let series = result
                .unwrap_or_else(|error| panic!("source '{}' failed: {error}", case.name));
            assert_eq!(series.symbol, symbol, "source '{}': symbol", case.name);
            assert_eq!(series.interval, interval, "source '{}': interval", case.name);

            for pair in series.bars.windows(2) {
                assert!(
                    pair[0].ts <= pair[1].ts,
                    "source '{}': bars must be ascending",
                    case.name
                );
            }
            for bar in &series.bars {
                for price in [bar.open, bar.high, bar.low, bar.close] {
                    assert!(
                        price.is_finite() && price >= 0.0,
                        "source '{}': price {price} must be finite and non-negative",
                        case.name
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn rows_with_missing_prices_are_dropped() {
    let case = &source_cases()[0];
    let series = case
        .source
        .fetch_intraday(&sensex())
        .await
        .expect("intraday");
    assert_eq!(series.bars.len(), 2);
    assert_eq!(series.last().map(|bar| bar.close), Some(18_120.0));
}

#[tokio::test]
async fn empty_upstream_answers_are_empty_series_not_errors() {
    let case = &source_cases()[1];
    assert!(case.source.fetch_intraday(&sensex()).await.expect("ok").is_empty());
    assert!(case.source.fetch_daily(&sensex(), 5).await.expect("ok").is_empty());
}

#[tokio::test]
async fn server_errors_are_classified_as_unavailable() {
    let source = YahooAdapter::with_http_client(Arc::new(FixtureHttpClient {
        status: 502,
        intraday_body: String::new(),
        daily_body: String::new(),
    }));

    let error = source
        .fetch_daily(&sensex(), 5)
        .await
        .expect_err("502 must fail");
    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert!(error.retryable());
    assert_eq!(error.code(), "source.unavailable");
}

#[tokio::test]
async fn rate_limit_responses_are_classified_as_rate_limited() {
    let source = YahooAdapter::with_http_client(Arc::new(FixtureHttpClient {
        status: 429,
        intraday_body: String::new(),
        daily_body: String::new(),
    }));

    let error = source
        .fetch_intraday(&sensex())
        .await
        .expect_err("429 must fail");
    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
}

#[tokio::test]
async fn unparseable_bodies_are_internal_errors() {
    let source = YahooAdapter::with_http_client(Arc::new(FixtureHttpClient {
        status: 200,
        intraday_body: String::from("<html>maintenance</html>"),
        daily_body: String::new(),
    }));

    let error = source
        .fetch_intraday(&sensex())
        .await
        .expect_err("html must fail");
    assert_eq!(error.kind(), SourceErrorKind::Internal);
    assert!(!error.retryable());
}
