//! Request DTOs

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::response::ApiError;

/// Open an account for the authenticated user
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateAccountRequest {
    #[schema(example = "USD")]
    #[validate(length(equal = 3))]
    pub currency: String,
}

/// Page through the caller's accounts
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct ListAccountsQuery {
    /// 1-based page number
    #[validate(range(min = 1))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 20))]
    pub page_size: i64,
}

impl ListAccountsQuery {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Rows to skip; a page beyond `i64` range is a bad request
    pub fn offset(&self) -> Result<i64, ApiError> {
        self.page_id
            .checked_sub(1)
            .and_then(|skipped| skipped.checked_mul(self.page_size))
            .ok_or_else(|| ApiError::bad_request("page_id out of range"))
    }
}

/// Move funds from one of the caller's accounts
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TransferRequest {
    #[validate(range(min = 1))]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    pub to_account_id: i64,
    #[schema(example = 100)]
    #[validate(range(min = 1))]
    pub amount: i64,
    #[schema(example = "USD")]
    #[validate(length(equal = 3))]
    pub currency: String,
}
