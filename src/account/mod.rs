//! Account management module
//!
//! CreateAccount / GetAccount / ListAccounts over the shared ledger.

pub mod service;

pub use service::AccountService;
