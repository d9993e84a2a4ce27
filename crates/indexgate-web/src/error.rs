use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use indexgate_core::{ConfigError, GatewayError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match &self {
            ServerError::Gateway(error) => {
                let status = StatusCode::from_u16(error.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::warn!(code = error.code(), %error, "request failed upstream");
                } else {
                    tracing::debug!(code = error.code(), %error, "request rejected");
                }
                (status, Json(error.body())).into_response()
            }
            ServerError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ServerError>;
