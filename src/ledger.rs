//! Ledger - Transaction Coordinator
//!
//! Process-wide handle over the injected [`LedgerStore`]. Created once at
//! startup and passed explicitly to every service.
//!
//! A unit of work is an explicit [`LedgerTx`] from [`Ledger::begin`]; the
//! caller threads it through each write and ends it with [`settle`]. If the
//! handle is dropped instead (early return, panic, cancelled future) the
//! backend rolls it back and releases its connection and row locks.

use std::sync::Arc;

use crate::db::Database;
use crate::error::Result;
use crate::store::{LedgerStore, LedgerTx, MemoryLedgerStore, PgLedgerStore, Queries};

/// Shared ledger handle; cheap to clone
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Ledger over a PostgreSQL pool
    pub fn postgres(db: &Database) -> Self {
        Self::new(Arc::new(PgLedgerStore::new(db.clone())))
    }

    /// Ledger over a fresh in-memory store
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryLedgerStore::new()))
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    /// Open one unit of work
    pub async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        self.store.begin().await
    }

    /// Autocommit handle for single-statement reads and writes
    pub async fn acquire(&self) -> Result<Box<dyn Queries>> {
        self.store.acquire().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

/// End a unit of work according to its outcome
///
/// `Ok` commits and a commit failure is returned. `Err` rolls back and the
/// original error is returned unchanged; a failed rollback is only logged.
pub async fn settle<T>(mut tx: Box<dyn LedgerTx>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    error = %e,
                    rollback_error = %rollback_err,
                    "Rollback failed"
                );
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::models::{CreateAccountParams, CreateEntryParams, CreateUserParams};

    async fn ledger_with_account() -> (MemoryLedgerStore, Ledger, i64) {
        let store = MemoryLedgerStore::new();
        let ledger = Ledger::new(Arc::new(store.clone()));
        let mut conn = ledger.acquire().await.unwrap();
        conn.create_user(CreateUserParams {
            username: "alice".to_string(),
            full_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            hashed_password: "hash".to_string(),
        })
        .await
        .unwrap();
        let account = conn
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                currency: "USD".to_string(),
                balance: 100,
            })
            .await
            .unwrap();
        (store, ledger, account.id)
    }

    #[tokio::test]
    async fn test_settle_commits_on_ok() {
        let (store, ledger, id) = ledger_with_account().await;

        let mut tx = ledger.begin().await.unwrap();
        let result = tx
            .create_entry(CreateEntryParams {
                account_id: id,
                amount: 5,
            })
            .await;
        let entry = settle(tx, result).await.unwrap();

        assert_eq!(store.entry_count(), 1);
        let mut conn = ledger.acquire().await.unwrap();
        assert_eq!(conn.get_entry(entry.id).await.unwrap(), entry);
    }

    #[tokio::test]
    async fn test_settle_rolls_back_and_keeps_original_error() {
        let (store, ledger, id) = ledger_with_account().await;

        let mut tx = ledger.begin().await.unwrap();
        tx.add_account_balance(id, 50).await.unwrap();
        let failed: Result<()> = Err(LedgerError::validation("caller gave up"));
        let err = settle(tx, failed).await.unwrap_err();

        assert_eq!(err, LedgerError::validation("caller gave up"));
        assert_eq!(store.entry_count(), 0);
        let mut conn = ledger.acquire().await.unwrap();
        assert_eq!(conn.get_account(id).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_settle_returns_error_from_already_finished_unit() {
        let (_store, ledger, _id) = ledger_with_account().await;

        let mut tx = ledger.begin().await.unwrap();
        tx.commit().await.unwrap();
        let err = settle(tx, Ok(())).await.unwrap_err();
        assert!(matches!(err, LedgerError::Internal(_)));
    }

    #[tokio::test]
    async fn test_backend_name() {
        assert_eq!(Ledger::memory().backend(), "memory");
        assert!(Ledger::memory().ping().await.is_ok());
    }
}
