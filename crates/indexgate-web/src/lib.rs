//! HTTP surface for the indexgate gateway.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /realtime?index=` | latest snapshot for one index |
//! | `GET /historical?index=&start=&end=` | daily series for an inclusive date range |
//! | `GET /indices` | registered index codes and names |
//! | `GET /health` | liveness probe |

pub mod api;
pub mod error;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub use api::app_router;
pub use error::{ApiResult, ServerError};

/// Log output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}
