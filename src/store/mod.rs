//! Ledger Store
//!
//! CRUD persistence for users, accounts, entries and transfers. No business
//! logic lives here: every operation is a single statement touching a single
//! row.
//!
//! The operation set is the [`Queries`] capability trait. A [`LedgerStore`]
//! hands out two kinds of handles that both implement it:
//!
//! - [`LedgerStore::acquire`]: a pooled, autocommit handle
//! - [`LedgerStore::begin`]: a [`LedgerTx`] unit of work with explicit
//!   `commit` / `rollback`
//!
//! Two backends satisfy the same traits and are selected by injection:
//! [`PgLedgerStore`] over PostgreSQL and [`MemoryLedgerStore`] for tests.
//!
//! Dropping an unfinished [`LedgerTx`] rolls it back and releases its
//! connection and row locks, so a cancelled future never leaks either.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer, User,
};

/// The ledger operation set, implemented by every store handle
#[async_trait]
pub trait Queries: Send {
    // === Users ===

    async fn create_user(&mut self, params: CreateUserParams) -> Result<User>;

    async fn get_user(&mut self, username: &str) -> Result<User>;

    // === Accounts ===

    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account>;

    async fn get_account(&mut self, id: i64) -> Result<Account>;

    /// Read an account and hold its row lock until the unit of work ends
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account>;

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>>;

    /// Set the balance absolutely
    async fn update_account(&mut self, id: i64, balance: i64) -> Result<Account>;

    /// Add a signed delta to the balance and return the updated row
    async fn add_account_balance(&mut self, id: i64, amount: i64) -> Result<Account>;

    async fn delete_account(&mut self, id: i64) -> Result<()>;

    // === Entries ===

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry>;

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>>;

    // === Transfers ===

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer>;

    async fn list_transfers(&mut self, params: ListTransfersParams) -> Result<Vec<Transfer>>;
}

/// A unit of work: every write made through it commits or rolls back together
#[async_trait]
pub trait LedgerTx: Queries {
    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// A storage backend with process-wide lifecycle
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Pooled autocommit handle; each operation is its own statement
    async fn acquire(&self) -> Result<Box<dyn Queries>>;

    /// Open a unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<()>;
}
