use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use indexgate_core::{HistoricalPayload, IndexGateway, IndicesPayload, RealtimePayload};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiResult;

/// Index served when a request names none.
pub const DEFAULT_INDEX: &str = "sensex";

#[derive(Debug, Deserialize)]
struct RealtimeQuery {
    index: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoricalQuery {
    index: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

fn index_or_default(index: Option<&str>) -> &str {
    index
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or(DEFAULT_INDEX)
}

async fn get_realtime(
    State(gateway): State<IndexGateway>,
    Query(query): Query<RealtimeQuery>,
) -> ApiResult<Json<RealtimePayload>> {
    let payload = gateway
        .get_realtime(index_or_default(query.index.as_deref()))
        .await?;
    Ok(Json(payload))
}

async fn get_historical(
    State(gateway): State<IndexGateway>,
    Query(query): Query<HistoricalQuery>,
) -> ApiResult<Json<HistoricalPayload>> {
    let payload = gateway
        .get_historical(
            index_or_default(query.index.as_deref()),
            query.start.as_deref(),
            query.end.as_deref(),
        )
        .await?;
    Ok(Json(payload))
}

async fn get_indices(State(gateway): State<IndexGateway>) -> Json<IndicesPayload> {
    Json(gateway.list_indices())
}

async fn get_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn app_router(gateway: IndexGateway) -> Router {
    Router::new()
        .route("/realtime", get(get_realtime))
        .route("/historical", get(get_historical))
        .route("/indices", get(get_indices))
        .route("/health", get(get_health))
        .with_state(gateway)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
