//! Gateway types module
//!
//! ## Input Types
//! - [`CreateAccountRequest`], [`ListAccountsQuery`], [`TransferRequest`]:
//!   request bodies checked with `validator` before reaching a service
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: error half of [`ApiResult`], rendered as an `ApiResponse`
//!
//! ## Submodules
//! - [`requests`]: Request DTOs
//! - [`response`]: Response types and error codes

pub mod requests;
pub mod response;

// Re-export commonly used types at module root
pub use requests::{CreateAccountRequest, ListAccountsQuery, TransferRequest};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
