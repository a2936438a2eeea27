use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced by the gate's extractors and companion routes.
///
/// The gate itself never returns one of these: provider trouble degrades to
/// an anonymous request.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// No authenticated user on this request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Identity provider call failed inside a route handler.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::Provider(ref msg) => {
                tracing::error!(error = %msg, "Identity provider request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "ok": false, "error": msg })),
                )
                    .into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Gate configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for GateError {
    fn from(e: crate::error::Error) -> Self {
        Self::Provider(e.to_string())
    }
}
