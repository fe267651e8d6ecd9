//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiResponse, error_codes};

/// Health check response data
#[derive(serde::Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
    /// Storage backend in use
    #[schema(example = "postgres")]
    pub backend: String,
}

/// Health check endpoint
///
/// Pings the ledger store. Does NOT expose the failure detail.
///
/// - Healthy: 200 OK + {code: 0, data: {timestamp_ms, backend}}
/// - Unhealthy: 503 Service Unavailable
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthResponse>),
        (status = 503, description = "Service unavailable")
    ),
    tag = "System"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    match state.ledger.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponse {
                timestamp_ms: Utc::now().timestamp_millis(),
                backend: state.ledger.backend().to_string(),
            })),
        ),
        Err(e) => {
            tracing::error!("[HEALTH] {} ping failed: {}", state.ledger.backend(), e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    code: error_codes::SERVICE_UNAVAILABLE,
                    msg: "unavailable".to_string(),
                    data: None,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::handlers::test_support::test_state;

    #[tokio::test]
    async fn test_health_ok_on_memory_backend() {
        let (status, Json(resp)) = health_check(State(test_state())).await;
        assert_eq!(status, StatusCode::OK);
        let data = resp.data.unwrap();
        assert_eq!(data.backend, "memory");
        assert!(data.timestamp_ms > 0);
    }
}
