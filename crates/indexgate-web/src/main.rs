use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use indexgate_core::{GatewayConfig, IndexGateway};
use indexgate_web::{app_router, init_tracing, LogFormat, ServerError};

#[derive(Debug, Parser)]
#[command(name = "indexgate", version, about = "Index price gateway")]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "INDEXGATE_LISTEN_ADDR", default_value = "127.0.0.1:5000")]
    listen: SocketAddr,

    /// Log output format.
    #[arg(long, env = "INDEXGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = GatewayConfig::from_env().map_err(ServerError::from)?;
    tracing::info!(
        ttl_secs = config.ttl.as_secs(),
        fallback_ttl_secs = config.fallback_ttl.as_secs(),
        upstream_timeout_ms = duration_millis(config.upstream_timeout),
        display_offset = %config.display_offset,
        rate_limit_per_min = config.rate_limit_per_min,
        "gateway configured"
    );

    let router = app_router(IndexGateway::yahoo(&config));
    tracing::info!("Listening on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
