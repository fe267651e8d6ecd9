//! Ledger Error Types
//!
//! One taxonomy shared by the store backends, the unit-of-work coordinator
//! and the transfer orchestrator. Storage errors are classified once, at the
//! `From<sqlx::Error>` boundary, and then propagate unchanged.

use thiserror::Error;

/// Ledger error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account, entry, transfer or user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique, foreign-key or check violation at the storage layer
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Malformed input rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Debit would leave the source account below zero
    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {amount}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        amount: i64,
    },

    /// Unit of work exceeded its deadline and was rolled back
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Storage or connection failure unrelated to business rules
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::Timeout(_) => "TIMEOUT",
            LedgerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Validation(_) => 400,
            LedgerError::ConstraintViolation(_) => 403,
            LedgerError::NotFound(_) => 404,
            LedgerError::InsufficientFunds { .. } => 422,
            LedgerError::Internal(_) => 500,
            LedgerError::Timeout(_) => 504,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, LedgerError::ConstraintViolation(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => LedgerError::NotFound("no rows in result set".to_string()),
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation() =>
            {
                LedgerError::ConstraintViolation(db_err.message().to_string())
            }
            _ => LedgerError::Internal(e.to_string()),
        }
    }
}

/// Ledger result type
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::not_found("account 1").code(), "NOT_FOUND");
        assert_eq!(
            LedgerError::constraint("dup").code(),
            "CONSTRAINT_VIOLATION"
        );
        assert_eq!(
            LedgerError::InsufficientFunds {
                account_id: 1,
                balance: 5,
                amount: 10
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(LedgerError::validation("bad").http_status(), 400);
        assert_eq!(LedgerError::constraint("dup").http_status(), 403);
        assert_eq!(LedgerError::not_found("x").http_status(), 404);
        assert_eq!(LedgerError::internal("boom").http_status(), 500);
        assert_eq!(LedgerError::Timeout(100).http_status(), 504);
    }

    #[test]
    fn test_display() {
        let err = LedgerError::InsufficientFunds {
            account_id: 7,
            balance: 5,
            amount: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account 7: balance 5, requested 10"
        );
        assert_eq!(
            LedgerError::validation("amount must be positive").to_string(),
            "Validation error: amount must be positive"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_pool_timeout_maps_to_internal() {
        let err: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, LedgerError::Internal(_)));
    }
}
