//! Simple Bank - Transactional Ledger Service
//!
//! Accounts, entries and transfers with atomic, deadlock-free funds movement
//! under concurrent load.
//!
//! # Modules
//!
//! - [`error`] - Ledger error taxonomy
//! - [`models`] - Account, Entry, Transfer and User rows
//! - [`store`] - Ledger Store capability set (PostgreSQL and in-memory)
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`ledger`] - Transaction Coordinator
//! - [`transfer`] - Transfer Orchestrator
//! - [`account`] - Account service
//! - [`user_auth`] - Registration, login and JWT authentication
//! - [`gateway`] - HTTP API
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core ledger
pub mod error;
pub mod ledger;
pub mod models;
pub mod store;
pub mod transfer;

// Storage plumbing
pub mod db;

// Services and HTTP surface
pub mod account;
pub mod gateway;
pub mod user_auth;

// Ambient
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use account::AccountService;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, settle};
pub use models::{Account, Entry, Transfer, TransferResult, User};
pub use store::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore, Queries};
pub use transfer::{TransferParams, TransferService};
