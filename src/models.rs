//! Ledger data models
//!
//! Row types persisted by the ledger store plus the parameter structs its
//! operations take. Amounts and balances are signed integers in the smallest
//! currency unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{LedgerError, Result};

// ============================================================================
// Currencies
// ============================================================================

pub const USD: &str = "USD";
pub const EUR: &str = "EUR";
pub const CAD: &str = "CAD";
pub const INR: &str = "INR";

pub const SUPPORTED_CURRENCIES: [&str; 4] = [USD, EUR, CAD, INR];

/// Normalize a currency code and reject anything we do not hold accounts in
pub fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_uppercase();
    if SUPPORTED_CURRENCIES.contains(&code.as_str()) {
        Ok(code)
    } else {
        Err(LedgerError::validation(format!(
            "unsupported currency: {}",
            currency
        )))
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Bank user; referenced by `Account::owner`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

/// Balance-bearing account, unique per (owner, currency)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub currency: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Immutable signed balance delta against one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one funds movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Operation parameters
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: String,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Transfers where `from_account_id` is the source OR `to_account_id` the destination
#[derive(Debug, Clone, Copy)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Store-level bound on a single page
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Validate a limit/offset pair before it reaches storage
pub fn check_page(limit: i64, offset: i64) -> Result<()> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(LedgerError::validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    if offset < 0 {
        return Err(LedgerError::validation("offset must not be negative"));
    }
    Ok(())
}

// ============================================================================
// Transfer result
// ============================================================================

/// Snapshot returned by a committed transfer, labelled by the caller's direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
