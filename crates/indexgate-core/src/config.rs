//! Gateway configuration.
//!
//! | Variable | Default | Field |
//! |----------|---------|-------|
//! | `INDEXGATE_CACHE_TTL_SECS` | 300 | [`GatewayConfig::ttl`] |
//! | `INDEXGATE_FALLBACK_TTL_SECS` | 60 | [`GatewayConfig::fallback_ttl`] |
//! | `INDEXGATE_UPSTREAM_TIMEOUT_MS` | 5000 | [`GatewayConfig::upstream_timeout`] |
//! | `INDEXGATE_DISPLAY_OFFSET` | `+05:30` | [`GatewayConfig::display_offset`] |
//! | `INDEXGATE_RATE_LIMIT_PER_MIN` | 60 | [`GatewayConfig::rate_limit_per_min`] |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use time::UtcOffset;

use crate::cache::{DEFAULT_FALLBACK_TTL, DEFAULT_TTL};
use crate::error::ConfigError;
use crate::fetch::DEFAULT_UPSTREAM_TIMEOUT;
use crate::normalizer::{parse_offset, DEFAULT_DISPLAY_OFFSET};

pub const ENV_CACHE_TTL_SECS: &str = "INDEXGATE_CACHE_TTL_SECS";
pub const ENV_FALLBACK_TTL_SECS: &str = "INDEXGATE_FALLBACK_TTL_SECS";
pub const ENV_UPSTREAM_TIMEOUT_MS: &str = "INDEXGATE_UPSTREAM_TIMEOUT_MS";
pub const ENV_DISPLAY_OFFSET: &str = "INDEXGATE_DISPLAY_OFFSET";
pub const ENV_RATE_LIMIT_PER_MIN: &str = "INDEXGATE_RATE_LIMIT_PER_MIN";

/// Runtime knobs for [`IndexGateway`](crate::IndexGateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub ttl: Duration,
    pub fallback_ttl: Duration,
    pub upstream_timeout: Duration,
    pub display_offset: UtcOffset,
    pub rate_limit_per_min: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fallback_ttl: DEFAULT_FALLBACK_TTL,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            display_offset: DEFAULT_DISPLAY_OFFSET,
            rate_limit_per_min: 60,
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by any `INDEXGATE_*` variable that is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_CACHE_TTL_SECS)? {
            config.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_FALLBACK_TTL_SECS)? {
            config.fallback_ttl = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_var::<u64, _>(&lookup, ENV_UPSTREAM_TIMEOUT_MS)? {
            if millis == 0 {
                return Err(ConfigError::InvalidValue {
                    name: ENV_UPSTREAM_TIMEOUT_MS,
                    value: millis.to_string(),
                    reason: String::from("timeout must be greater than zero"),
                });
            }
            config.upstream_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = non_empty(&lookup, ENV_DISPLAY_OFFSET) {
            config.display_offset = parse_offset(&raw).map_err(|e| ConfigError::InvalidValue {
                name: ENV_DISPLAY_OFFSET,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(limit) = parse_var::<u32, _>(&lookup, ENV_RATE_LIMIT_PER_MIN)? {
            config.rate_limit_per_min = limit;
        }

        Ok(config)
    }

    /// Per-request timeout handed to the HTTP transport. It expires before
    /// [`Self::upstream_timeout`] so the adapter records the failure against
    /// its circuit breaker before the outer deadline drops the call.
    pub fn transport_timeout(&self) -> Duration {
        self.upstream_timeout * 9 / 10
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fallback_ttl(mut self, fallback_ttl: Duration) -> Self {
        self.fallback_ttl = fallback_ttl;
        self
    }

    pub fn with_upstream_timeout(mut self, upstream_timeout: Duration) -> Self {
        self.upstream_timeout = upstream_timeout;
        self
    }

    pub fn with_display_offset(mut self, display_offset: UtcOffset) -> Self {
        self.display_offset = display_offset;
        self
    }

    pub fn with_rate_limit_per_min(mut self, rate_limit_per_min: u32) -> Self {
        self.rate_limit_per_min = rate_limit_per_min;
        self
    }
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup, name) else {
        return Ok(None);
    };

    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        })
}
