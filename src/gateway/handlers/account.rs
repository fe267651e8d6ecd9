//! Account handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResponse, ApiResult, CreateAccountRequest, ListAccountsQuery, ok,
};
use crate::models::Account;
use crate::user_auth::Claims;

/// Open an account owned by the caller
///
/// POST /api/v1/accounts
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = ApiResponse<Account>),
        (status = 400, description = "Unsupported currency"),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Caller already holds an account in this currency")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let account = state
        .accounts
        .create_account(&claims.sub, &req.currency)
        .await?;
    ok(account)
}

/// Get one of the caller's accounts
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(
        ("id" = i64, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account details", body = ApiResponse<Account>),
        (status = 401, description = "Account belongs to another user"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    if id < 1 {
        return ApiError::bad_request("id must be positive").into_err();
    }

    let account = state.accounts.get_account(id).await?;
    if account.owner != claims.sub {
        return ApiError::unauthorized("account doesn't belong to the authenticated user")
            .into_err();
    }
    ok(account)
}

/// List the caller's accounts
///
/// GET /api/v1/accounts?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Accounts page", body = ApiResponse<Vec<Account>>),
        (status = 400, description = "Invalid paging parameters"),
        (status = 401, description = "Authentication failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListAccountsQuery>,
) -> ApiResult<Vec<Account>> {
    query
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let offset = query.offset()?;
    let accounts = state
        .accounts
        .list_accounts(&claims.sub, query.limit(), offset)
        .await?;
    ok(accounts)
}
