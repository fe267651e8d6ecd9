//! In-memory Ledger Store
//!
//! A test double satisfying the same [`Queries`] / [`LedgerTx`] capability
//! set as the PostgreSQL backend, with the isolation behaviour the transfer
//! engine depends on:
//!
//! - **Row locks**: every balance write (and `get_account_for_update`) takes a
//!   per-account `tokio::sync::Mutex`, held by the unit of work until it
//!   commits or rolls back. Two units locking the same accounts in opposite
//!   order deadlock here exactly as they would in the database.
//! - **Write buffering**: a unit's writes stay private until commit, when they
//!   are published before its row locks are released.
//! - **Unique keys**: username, email and (owner, currency) are reserved
//!   eagerly and released again on rollback.
//! - **Foreign keys**: inserts referencing missing rows fail with
//!   `ConstraintViolation`.
//!
//! Sequence values (account / entry / transfer ids) are not rolled back, the
//! same as PostgreSQL sequences.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTx, Queries};
use crate::error::{LedgerError, Result};
use crate::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer, User, check_page,
};

/// `fail_entry_for` value meaning "no injected failure" (ids start at 1)
const NO_FAILURE: i64 = 0;

/// Committed state shared by every handle
#[derive(Default)]
struct Tables {
    users: DashMap<String, User>,
    accounts: DashMap<i64, Account>,
    entries: DashMap<i64, Entry>,
    transfers: DashMap<i64, Transfer>,

    // unique-key reservations
    usernames: DashSet<String>,
    emails: DashSet<String>,
    owner_currency: DashSet<(String, String)>,

    row_locks: DashMap<i64, Arc<Mutex<()>>>,

    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,

    fail_entry_for: AtomicI64,
}

impl Tables {
    fn next_id(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// In-memory store; clones share the same tables
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    tables: Arc<Tables>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `create_entry` for `account_id` fail with a constraint
    /// violation, or clear the failure with `None`
    pub fn set_fail_entry_for(&self, account_id: Option<i64>) {
        self.tables
            .fail_entry_for
            .store(account_id.unwrap_or(NO_FAILURE), Ordering::SeqCst);
    }

    /// Number of committed entries
    pub fn entry_count(&self) -> usize {
        self.tables.entries.len()
    }

    /// Number of committed transfers
    pub fn transfer_count(&self) -> usize {
        self.tables.transfers.len()
    }

    fn handle(&self, autocommit: bool) -> MemoryHandle {
        MemoryHandle {
            tables: self.tables.clone(),
            autocommit,
            state: TxState::Active,
            locks: BTreeMap::new(),
            pending: WriteSet::default(),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn acquire(&self) -> Result<Box<dyn Queries>> {
        Ok(Box::new(self.handle(true)))
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(self.handle(false)))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    /// A statement failed; only rollback is accepted
    Aborted,
    Finished,
}

/// Writes made by one unit, invisible to everyone else until commit
#[derive(Default)]
struct WriteSet {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<i64, Account>,
    deleted_accounts: BTreeSet<i64>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,

    reserved_usernames: Vec<String>,
    reserved_emails: Vec<String>,
    reserved_owner_currency: Vec<(String, String)>,
}

/// Autocommit handle or unit of work over a [`MemoryLedgerStore`]
pub struct MemoryHandle {
    tables: Arc<Tables>,
    autocommit: bool,
    state: TxState,
    /// Row locks held until the unit ends, keyed by account id
    locks: BTreeMap<i64, OwnedMutexGuard<()>>,
    pending: WriteSet,
}

impl MemoryHandle {
    fn check_usable(&self) -> Result<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Aborted => Err(LedgerError::internal(
                "current transaction is aborted, commands ignored until end of transaction block",
            )),
            TxState::Finished => Err(LedgerError::internal("transaction already finished")),
        }
    }

    /// Close out one statement: autocommit handles publish or discard it,
    /// units of work become aborted on a storage error
    fn end_statement<T>(&mut self, result: Result<T>) -> Result<T> {
        if self.autocommit {
            match &result {
                Ok(_) => self.publish(),
                Err(_) => self.discard(),
            }
            self.locks.clear();
        } else if matches!(
            result,
            Err(LedgerError::ConstraintViolation(_)) | Err(LedgerError::Internal(_))
        ) {
            self.state = TxState::Aborted;
        }
        result
    }

    async fn lock_row(&mut self, id: i64) {
        if self.locks.contains_key(&id) {
            return;
        }
        let row = self.tables.row_locks.entry(id).or_default().clone();
        let guard = row.lock_owned().await;
        self.locks.insert(id, guard);
    }

    fn publish(&mut self) {
        let ws = std::mem::take(&mut self.pending);
        for (username, user) in ws.users {
            self.tables.users.insert(username, user);
        }
        for (id, account) in ws.accounts {
            self.tables.accounts.insert(id, account);
        }
        for id in ws.deleted_accounts {
            if let Some((_, account)) = self.tables.accounts.remove(&id) {
                self.tables
                    .owner_currency
                    .remove(&(account.owner, account.currency));
            }
        }
        for (id, entry) in ws.entries {
            self.tables.entries.insert(id, entry);
        }
        for (id, transfer) in ws.transfers {
            self.tables.transfers.insert(id, transfer);
        }
    }

    fn discard(&mut self) {
        let ws = std::mem::take(&mut self.pending);
        for username in ws.reserved_usernames {
            self.tables.usernames.remove(&username);
        }
        for email in ws.reserved_emails {
            self.tables.emails.remove(&email);
        }
        for key in ws.reserved_owner_currency {
            self.tables.owner_currency.remove(&key);
        }
    }

    fn finish(&mut self, commit: bool) {
        if commit {
            self.publish();
        } else {
            self.discard();
        }
        self.locks.clear();
        self.state = TxState::Finished;
    }

    // === Visibility ===

    fn visible_user(&self, username: &str) -> Option<User> {
        if let Some(user) = self.pending.users.get(username) {
            return Some(user.clone());
        }
        self.tables.users.get(username).map(|r| r.value().clone())
    }

    fn visible_account(&self, id: i64) -> Option<Account> {
        if self.pending.deleted_accounts.contains(&id) {
            return None;
        }
        if let Some(account) = self.pending.accounts.get(&id) {
            return Some(account.clone());
        }
        self.tables.accounts.get(&id).map(|r| r.value().clone())
    }

    fn visible_accounts(&self) -> Vec<Account> {
        let mut rows: BTreeMap<i64, Account> = self
            .tables
            .accounts
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        rows.extend(self.pending.accounts.iter().map(|(id, a)| (*id, a.clone())));
        for id in &self.pending.deleted_accounts {
            rows.remove(id);
        }
        rows.into_values().collect()
    }

    fn visible_entries(&self) -> Vec<Entry> {
        let mut rows: BTreeMap<i64, Entry> = self
            .tables
            .entries
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        rows.extend(self.pending.entries.iter().map(|(id, e)| (*id, e.clone())));
        rows.into_values().collect()
    }

    fn visible_transfers(&self) -> Vec<Transfer> {
        let mut rows: BTreeMap<i64, Transfer> = self
            .tables
            .transfers
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        rows.extend(self.pending.transfers.iter().map(|(id, t)| (*id, t.clone())));
        rows.into_values().collect()
    }

    fn require_account_fk(&self, table: &str, account_id: i64) -> Result<()> {
        if self.visible_account(account_id).is_none() {
            return Err(LedgerError::constraint(format!(
                "insert on table \"{}\" violates foreign key constraint: account {} does not exist",
                table, account_id
            )));
        }
        Ok(())
    }

    // === Statements ===

    fn insert_user(&mut self, params: CreateUserParams) -> Result<User> {
        if !self.tables.usernames.insert(params.username.clone()) {
            return Err(LedgerError::constraint(
                "duplicate key value violates unique constraint \"users_pkey\"",
            ));
        }
        self.pending.reserved_usernames.push(params.username.clone());

        if !self.tables.emails.insert(params.email.clone()) {
            return Err(LedgerError::constraint(
                "duplicate key value violates unique constraint \"users_email_key\"",
            ));
        }
        self.pending.reserved_emails.push(params.email.clone());

        let user = User {
            username: params.username,
            full_name: params.full_name,
            email: params.email,
            hashed_password: params.hashed_password,
            created_at: Utc::now(),
        };
        self.pending
            .users
            .insert(user.username.clone(), user.clone());
        Ok(user)
    }

    fn insert_account(&mut self, params: CreateAccountParams) -> Result<Account> {
        if self.visible_user(&params.owner).is_none() {
            return Err(LedgerError::constraint(format!(
                "insert on table \"accounts\" violates foreign key constraint: user {} does not exist",
                params.owner
            )));
        }

        let key = (params.owner.clone(), params.currency.clone());
        if !self.tables.owner_currency.insert(key.clone()) {
            return Err(LedgerError::constraint(
                "duplicate key value violates unique constraint \"owner_currency_key\"",
            ));
        }
        self.pending.reserved_owner_currency.push(key);

        let account = Account {
            id: Tables::next_id(&self.tables.account_seq),
            owner: params.owner,
            currency: params.currency,
            balance: params.balance,
            created_at: Utc::now(),
        };
        self.pending.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn locked_account(&mut self, id: i64) -> Result<Account> {
        self.lock_row(id).await;
        match self.visible_account(id) {
            Some(account) => Ok(account),
            None => {
                self.locks.remove(&id);
                Err(LedgerError::not_found(format!("account {}", id)))
            }
        }
    }

    async fn write_balance(&mut self, id: i64, balance: impl FnOnce(i64) -> Option<i64>) -> Result<Account> {
        let mut account = self.locked_account(id).await?;
        account.balance = balance(account.balance)
            .ok_or_else(|| LedgerError::internal("bigint out of range"))?;
        self.pending.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn remove_account(&mut self, id: i64) -> Result<()> {
        self.locked_account(id).await?;

        let referenced = self
            .visible_entries()
            .iter()
            .any(|e| e.account_id == id)
            || self
                .visible_transfers()
                .iter()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(LedgerError::constraint(format!(
                "delete on table \"accounts\" violates foreign key constraint: account {} is still referenced",
                id
            )));
        }

        self.pending.accounts.remove(&id);
        self.pending.deleted_accounts.insert(id);
        Ok(())
    }

    fn insert_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        self.require_account_fk("entries", params.account_id)?;

        let fail = self.tables.fail_entry_for.load(Ordering::SeqCst);
        if fail != NO_FAILURE && fail == params.account_id {
            return Err(LedgerError::constraint(format!(
                "injected failure inserting entry for account {}",
                params.account_id
            )));
        }

        let entry = Entry {
            id: Tables::next_id(&self.tables.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.pending.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn insert_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        self.require_account_fk("transfers", params.from_account_id)?;
        self.require_account_fk("transfers", params.to_account_id)?;
        if params.amount <= 0 {
            return Err(LedgerError::constraint(
                "new row for relation \"transfers\" violates check constraint \"transfers_amount_check\"",
            ));
        }

        let transfer = Transfer {
            id: Tables::next_id(&self.tables.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.pending.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }
}

fn page<T>(rows: impl IntoIterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        if !self.autocommit && self.state != TxState::Finished {
            tracing::debug!(
                locks = self.locks.len(),
                "memory transaction dropped before commit, rolling back"
            );
            self.discard();
        }
    }
}

#[async_trait]
impl Queries for MemoryHandle {
    async fn create_user(&mut self, params: CreateUserParams) -> Result<User> {
        self.check_usable()?;
        let result = self.insert_user(params);
        self.end_statement(result)
    }

    async fn get_user(&mut self, username: &str) -> Result<User> {
        self.check_usable()?;
        self.visible_user(username)
            .ok_or_else(|| LedgerError::not_found(format!("user {}", username)))
    }

    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account> {
        self.check_usable()?;
        let result = self.insert_account(params);
        self.end_statement(result)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account> {
        self.check_usable()?;
        self.visible_account(id)
            .ok_or_else(|| LedgerError::not_found(format!("account {}", id)))
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account> {
        self.check_usable()?;
        let result = self.locked_account(id).await;
        self.end_statement(result)
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>> {
        self.check_usable()?;
        check_page(params.limit, params.offset)?;
        let rows = self
            .visible_accounts()
            .into_iter()
            .filter(|a| a.owner == params.owner);
        Ok(page(rows, params.limit, params.offset))
    }

    async fn update_account(&mut self, id: i64, balance: i64) -> Result<Account> {
        self.check_usable()?;
        let result = self.write_balance(id, |_| Some(balance)).await;
        self.end_statement(result)
    }

    async fn add_account_balance(&mut self, id: i64, amount: i64) -> Result<Account> {
        self.check_usable()?;
        let result = self
            .write_balance(id, |current| current.checked_add(amount))
            .await;
        self.end_statement(result)
    }

    async fn delete_account(&mut self, id: i64) -> Result<()> {
        self.check_usable()?;
        let result = self.remove_account(id).await;
        self.end_statement(result)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        self.check_usable()?;
        let result = self.insert_entry(params);
        self.end_statement(result)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry> {
        self.check_usable()?;
        if let Some(entry) = self.pending.entries.get(&id) {
            return Ok(entry.clone());
        }
        self.tables
            .entries
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| LedgerError::not_found(format!("entry {}", id)))
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>> {
        self.check_usable()?;
        check_page(params.limit, params.offset)?;
        let rows = self
            .visible_entries()
            .into_iter()
            .filter(|e| e.account_id == params.account_id);
        Ok(page(rows, params.limit, params.offset))
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        self.check_usable()?;
        let result = self.insert_transfer(params);
        self.end_statement(result)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer> {
        self.check_usable()?;
        if let Some(transfer) = self.pending.transfers.get(&id) {
            return Ok(transfer.clone());
        }
        self.tables
            .transfers
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| LedgerError::not_found(format!("transfer {}", id)))
    }

    async fn list_transfers(&mut self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        self.check_usable()?;
        check_page(params.limit, params.offset)?;
        let rows = self.visible_transfers().into_iter().filter(|t| {
            t.from_account_id == params.from_account_id || t.to_account_id == params.to_account_id
        });
        Ok(page(rows, params.limit, params.offset))
    }
}

#[async_trait]
impl LedgerTx for MemoryHandle {
    async fn commit(&mut self) -> Result<()> {
        if self.autocommit {
            return Ok(());
        }
        match self.state {
            TxState::Active => {
                self.finish(true);
                Ok(())
            }
            TxState::Aborted => {
                self.finish(false);
                Err(LedgerError::internal(
                    "commit of aborted transaction, rolled back instead",
                ))
            }
            TxState::Finished => Err(LedgerError::internal("transaction already finished")),
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.autocommit {
            return Ok(());
        }
        if self.state == TxState::Finished {
            return Err(LedgerError::internal("transaction already finished"));
        }
        self.finish(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tokio::time::timeout;

    async fn seed_user(store: &MemoryLedgerStore, username: &str) -> User {
        let mut conn = store.acquire().await.unwrap();
        conn.create_user(CreateUserParams {
            username: username.to_string(),
            full_name: format!("{} Test", username),
            email: format!("{}@example.com", username),
            hashed_password: "hash".to_string(),
        })
        .await
        .unwrap()
    }

    async fn seed_account(store: &MemoryLedgerStore, owner: &str, balance: i64) -> Account {
        let mut conn = store.acquire().await.unwrap();
        conn.create_account(CreateAccountParams {
            owner: owner.to_string(),
            currency: "USD".to_string(),
            balance,
        })
        .await
        .unwrap()
    }

    async fn balance_of(store: &MemoryLedgerStore, id: i64) -> i64 {
        let mut conn = store.acquire().await.unwrap();
        conn.get_account(id).await.unwrap().balance
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;
        assert_eq!(account.id, 1);
        assert_eq!(account.balance, 100);

        let mut conn = store.acquire().await.unwrap();
        assert_eq!(conn.get_account(account.id).await.unwrap(), account);
        assert!(conn.get_account(99).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_account_requires_existing_owner() {
        let store = MemoryLedgerStore::new();
        let mut conn = store.acquire().await.unwrap();
        let err = conn
            .create_account(CreateAccountParams {
                owner: "ghost".to_string(),
                currency: "USD".to_string(),
                balance: 0,
            })
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_duplicate_owner_currency_rejected() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        seed_account(&store, "alice", 0).await;

        let mut conn = store.acquire().await.unwrap();
        let err = conn
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                currency: "USD".to_string(),
                balance: 0,
            })
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());

        // a different currency is a different account
        let eur = conn
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                currency: "EUR".to_string(),
                balance: 0,
            })
            .await
            .unwrap();
        assert_eq!(eur.currency, "EUR");
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let mut conn = store.acquire().await.unwrap();

        let same_name = conn
            .create_user(CreateUserParams {
                username: "alice".to_string(),
                full_name: "Other".to_string(),
                email: "other@example.com".to_string(),
                hashed_password: "hash".to_string(),
            })
            .await;
        assert!(same_name.unwrap_err().is_constraint_violation());

        let same_email = conn
            .create_user(CreateUserParams {
                username: "bob".to_string(),
                full_name: "Bob".to_string(),
                email: "alice@example.com".to_string(),
                hashed_password: "hash".to_string(),
            })
            .await;
        assert!(same_email.unwrap_err().is_constraint_violation());

        // the failed insert released its username reservation
        assert!(conn.get_user("bob").await.unwrap_err().is_not_found());
        seed_user(&store, "bob").await;
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_private() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;

        let mut tx = store.begin().await.unwrap();
        let updated = tx.add_account_balance(account.id, -30).await.unwrap();
        assert_eq!(updated.balance, 70);
        assert_eq!(tx.get_account(account.id).await.unwrap().balance, 70);

        // outside readers never block and see committed state
        assert_eq!(balance_of(&store, account.id).await, 100);

        tx.commit().await.unwrap();
        assert_eq!(balance_of(&store, account.id).await, 70);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes_and_reservations() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;

        let mut tx = store.begin().await.unwrap();
        tx.create_entry(CreateEntryParams {
            account_id: account.id,
            amount: 10,
        })
        .await
        .unwrap();
        tx.add_account_balance(account.id, 10).await.unwrap();
        tx.create_account(CreateAccountParams {
            owner: "alice".to_string(),
            currency: "CAD".to_string(),
            balance: 0,
        })
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.entry_count(), 0);
        assert_eq!(balance_of(&store, account.id).await, 100);

        // CAD reservation was released
        let mut conn = store.acquire().await.unwrap();
        conn.create_account(CreateAccountParams {
            owner: "alice".to_string(),
            currency: "CAD".to_string(),
            balance: 0,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back_and_unlocks() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.add_account_balance(account.id, 50).await.unwrap();
        }

        assert_eq!(balance_of(&store, account.id).await, 100);
        let mut conn = store.acquire().await.unwrap();
        let updated = timeout(
            Duration::from_secs(1),
            conn.add_account_balance(account.id, 1),
        )
        .await
        .expect("row lock must be released on drop")
        .unwrap();
        assert_eq!(updated.balance, 101);
    }

    #[tokio::test]
    async fn test_finished_transaction_rejects_second_end() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(tx.commit().await, Err(LedgerError::Internal(_))));
        assert!(matches!(tx.rollback().await, Err(LedgerError::Internal(_))));
        assert!(matches!(
            tx.get_account(1).await,
            Err(LedgerError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_error_aborts_transaction() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;

        let mut tx = store.begin().await.unwrap();
        tx.add_account_balance(account.id, 5).await.unwrap();
        let err = tx
            .create_entry(CreateEntryParams {
                account_id: 999,
                amount: 5,
            })
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());

        // further statements are refused and commit degrades to rollback
        assert!(matches!(
            tx.get_account(account.id).await,
            Err(LedgerError::Internal(_))
        ));
        assert!(tx.commit().await.is_err());
        assert_eq!(balance_of(&store, account.id).await, 100);
    }

    #[tokio::test]
    async fn test_not_found_does_not_abort_transaction() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.add_account_balance(404, 1).await.unwrap_err().is_not_found());
        tx.add_account_balance(account.id, 1).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(balance_of(&store, account.id).await, 101);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_until_commit() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 100).await;

        let mut first = store.begin().await.unwrap();
        first.add_account_balance(account.id, -10).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let blocked = timeout(
            Duration::from_millis(50),
            second.add_account_balance(account.id, -10),
        )
        .await;
        assert!(blocked.is_err(), "second writer must wait for the row lock");

        first.commit().await.unwrap();
        let updated = second.add_account_balance(account.id, -10).await.unwrap();
        assert_eq!(updated.balance, 80, "second writer sees the committed debit");
        second.commit().await.unwrap();
        assert_eq!(balance_of(&store, account.id).await, 80);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_opposite_lock_order_deadlocks() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;
        let a = seed_account(&store, "alice", 100).await;
        let b = seed_account(&store, "bob", 100).await;

        let barrier = Arc::new(Barrier::new(2));
        let run = |first: i64, second: i64| {
            let store = store.clone();
            let barrier = barrier.clone();
            async move {
                let mut tx = store.begin().await.unwrap();
                tx.add_account_balance(first, -1).await.unwrap();
                barrier.wait().await;
                tx.add_account_balance(second, 1).await.unwrap();
                tx.commit().await.unwrap();
            }
        };

        let both = async { tokio::join!(run(a.id, b.id), run(b.id, a.id)) };
        let outcome = timeout(Duration::from_millis(200), both).await;
        assert!(outcome.is_err(), "opposite lock order must deadlock");

        // the abandoned units released their locks when dropped
        assert_eq!(balance_of(&store, a.id).await, 100);
        assert_eq!(balance_of(&store, b.id).await, 100);
        let mut conn = store.acquire().await.unwrap();
        timeout(Duration::from_secs(1), conn.add_account_balance(a.id, 1))
            .await
            .expect("locks released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_injected_entry_failure() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 0).await;
        store.set_fail_entry_for(Some(account.id));

        let mut conn = store.acquire().await.unwrap();
        let params = CreateEntryParams {
            account_id: account.id,
            amount: 1,
        };
        assert!(conn.create_entry(params).await.unwrap_err().is_constraint_violation());

        store.set_fail_entry_for(None);
        assert!(conn.create_entry(params).await.is_ok());
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_transfer_requires_positive_amount_and_accounts() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let a = seed_account(&store, "alice", 0).await;

        let mut conn = store.acquire().await.unwrap();
        let missing = conn
            .create_transfer(CreateTransferParams {
                from_account_id: a.id,
                to_account_id: 77,
                amount: 1,
            })
            .await;
        assert!(missing.unwrap_err().is_constraint_violation());

        let zero = conn
            .create_transfer(CreateTransferParams {
                from_account_id: a.id,
                to_account_id: a.id,
                amount: 0,
            })
            .await;
        assert!(zero.unwrap_err().is_constraint_violation());
        assert_eq!(store.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_list_pagination_and_bounds() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let account = seed_account(&store, "alice", 0).await;

        let mut conn = store.acquire().await.unwrap();
        for amount in 1..=7 {
            conn.create_entry(CreateEntryParams {
                account_id: account.id,
                amount,
            })
            .await
            .unwrap();
        }

        let page = conn
            .list_entries(ListEntriesParams {
                account_id: account.id,
                limit: 5,
                offset: 5,
            })
            .await
            .unwrap();
        assert_eq!(page.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![6, 7]);

        let err = conn
            .list_entries(ListEntriesParams {
                account_id: account.id,
                limit: 0,
                offset: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_transfers_matches_either_side() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;
        seed_user(&store, "carol").await;
        let a = seed_account(&store, "alice", 0).await;
        let b = seed_account(&store, "bob", 0).await;
        let c = seed_account(&store, "carol", 0).await;

        let mut conn = store.acquire().await.unwrap();
        for (from, to) in [(a.id, b.id), (b.id, a.id), (c.id, b.id), (c.id, a.id)] {
            conn.create_transfer(CreateTransferParams {
                from_account_id: from,
                to_account_id: to,
                amount: 5,
            })
            .await
            .unwrap();
        }

        let rows = conn
            .list_transfers(ListTransfersParams {
                from_account_id: a.id,
                to_account_id: a.id,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_delete_account() {
        let store = MemoryLedgerStore::new();
        seed_user(&store, "alice").await;
        let used = seed_account(&store, "alice", 0).await;
        let mut conn = store.acquire().await.unwrap();
        let unused = conn
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                currency: "EUR".to_string(),
                balance: 0,
            })
            .await
            .unwrap();
        conn.create_entry(CreateEntryParams {
            account_id: used.id,
            amount: 1,
        })
        .await
        .unwrap();

        assert!(conn.delete_account(used.id).await.unwrap_err().is_constraint_violation());
        conn.delete_account(unused.id).await.unwrap();
        assert!(conn.get_account(unused.id).await.unwrap_err().is_not_found());
        assert!(conn.delete_account(unused.id).await.unwrap_err().is_not_found());

        // owner+currency is free again
        conn.create_account(CreateAccountParams {
            owner: "alice".to_string(),
            currency: "EUR".to_string(),
            balance: 0,
        })
        .await
        .unwrap();
    }
}
