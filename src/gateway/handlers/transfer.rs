//! Transfer handler

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, ApiResult, TransferRequest, ok};
use crate::models::{Account, TransferResult, normalize_currency};
use crate::transfer::TransferParams;
use crate::user_auth::Claims;

/// Move funds from one of the caller's accounts to any account of the same currency
///
/// POST /api/v1/transfers
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = ApiResponse<TransferResult>),
        (status = 400, description = "Invalid parameters or currency mismatch"),
        (status = 401, description = "Source account belongs to another user"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Insufficient funds"),
        (status = 504, description = "Transfer deadline exceeded")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferResult> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let currency = normalize_currency(&req.currency)?;

    let from = valid_account(&state, req.from_account_id, &currency).await?;
    if from.owner != claims.sub {
        return ApiError::unauthorized("from account doesn't belong to the authenticated user")
            .into_err();
    }
    valid_account(&state, req.to_account_id, &currency).await?;

    let params = TransferParams::new(req.from_account_id, req.to_account_id, req.amount);
    let result = state
        .transfers
        .transfer_with_deadline(params, state.transfer_timeout)
        .await?;
    ok(result)
}

/// Account must exist and hold `currency`
async fn valid_account(state: &AppState, id: i64, currency: &str) -> Result<Account, ApiError> {
    let account = state.accounts.get_account(id).await?;
    if account.currency != currency {
        return Err(ApiError::bad_request(format!(
            "account [{}] currency mismatch: {} vs {}",
            id, account.currency, currency
        )));
    }
    Ok(account)
}
