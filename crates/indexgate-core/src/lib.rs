//! # Indexgate Core
//!
//! Index-price gateway: normalized, display-zone-correct realtime and
//! historical index data in front of an unreliable upstream provider.
//!
//! ## Overview
//!
//! - **Index registry** mapping public index codes to upstream tickers
//! - **Timestamp and range normalization** against an injectable clock
//! - **Tiered fetch strategy** degrading from intraday to daily bars
//! - **Freshness cache** with per-symbol TTL and single-flight refresh
//! - **Gateway facade** producing payloads or structured errors
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Upstream adapters (Yahoo chart API) |
//! | [`cache`] | Freshness cache |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`clock`] | Injectable wall clock |
//! | [`config`] | `INDEXGATE_*` configuration |
//! | [`data_source`] | Upstream capability trait and errors |
//! | [`domain`] | Domain models (Symbol, Bar, RealtimeSnapshot) |
//! | [`error`] | Validation and configuration errors |
//! | [`fetch`] | Tiered fetch strategy |
//! | [`gateway`] | Gateway facade and payloads |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`normalizer`] | Display-zone timestamp normalizer |
//! | [`range`] | Historical range normalizer |
//! | [`registry`] | Index registry |
//! | [`throttling`] | Upstream rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use indexgate_core::{GatewayConfig, IndexGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = IndexGateway::yahoo(&GatewayConfig::from_env()?);
//!
//!     let quote = gateway.get_realtime("sensex").await?;
//!     println!("{} {} ({})", quote.name, quote.close, quote.status);
//!
//!     let history = gateway
//!         .get_historical("nifty50", Some("2023-01-01"), Some("2023-01-31"))
//!         .await?;
//!     println!("{} rows", history.data.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  IndexGateway   │──── IndexRegistry / RangeNormalizer
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ FreshnessCache  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ TieredFetch     │────▶│ MarketDataSource │
//! │ Strategy        │     │ (YahooAdapter)   │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ Circuit Breaker  │
//!                         │ Throttle / HTTP  │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Every facade error carries an HTTP status and a JSON body:
//!
//! ```rust
//! use indexgate_core::GatewayError;
//!
//! fn describe(error: &GatewayError) -> String {
//!     format!("{} {} {}", error.status_code(), error.code(), error.body())
//! }
//! ```

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod http_client;
pub mod normalizer;
pub mod range;
pub mod registry;
pub mod throttling;

// Adapter implementations
pub use adapters::YahooAdapter;

// Caching
pub use cache::{CacheEntry, FreshnessCache};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Clock
pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use config::GatewayConfig;

// Upstream capability
pub use data_source::{MarketDataSource, SourceError, SourceErrorKind, SourceFuture};

// Domain models
pub use domain::{
    Bar, BarSeries, HistoricalBar, IndexDefinition, Interval, RealtimeSnapshot, SnapshotStatus,
    Symbol, UtcDateTime,
};

// Error types
pub use error::{ConfigError, ValidationError};

// Fetch strategy
pub use fetch::{TieredFetchStrategy, Unavailable};

// Facade
pub use gateway::{
    GatewayError, HistoricalPayload, HistoricalRow, IndexGateway, IndicesPayload, Operation,
    RealtimePayload,
};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Normalizers
pub use normalizer::{ParseError, TimestampNormalizer};
pub use range::{RangeError, RangeErrorKind, RangeNormalizer, ResolvedRange};

// Registry
pub use registry::{IndexRegistry, InvalidIndex};

// Throttling
pub use throttling::UpstreamThrottle;
