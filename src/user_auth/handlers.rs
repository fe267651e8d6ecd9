use axum::{Json, extract::State};
use std::sync::Arc;
use validator::Validate;

use super::service::{AuthError, CreateUserRequest, LoginRequest, LoginResponse, UserResponse};
use crate::error::LedgerError;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiError, ApiResponse, ApiResult, ok};

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Ledger(LedgerError::ConstraintViolation(_)) => {
                ApiError::forbidden("Username or email already exists")
            }
            AuthError::Ledger(LedgerError::NotFound(_)) => ApiError::not_found("User not found"),
            AuthError::Ledger(other) => other.into(),
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid username or password"),
            AuthError::Internal(e) => {
                tracing::error!("Auth failure: {:?}", e);
                ApiError::internal("internal error")
            }
        }
    }
}

/// Register a new user
///
/// POST /api/v1/users
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User registered", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Username or email already exists"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let user = state.user_auth.register(req).await?;
    ok(user.into())
}

/// Login user
///
/// POST /api/v1/users/login
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User not found")
    ),
    tag = "Auth"
)]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    match state.user_auth.login(req).await {
        Ok(resp) => ok(resp),
        Err(e) => {
            tracing::warn!("Login failed: {}", e);
            Err(e.into())
        }
    }
}
