//! PostgreSQL Ledger Store
//!
//! Runtime-checked sqlx queries against the `users`, `accounts`, `entries`
//! and `transfers` tables. Row locks are the database's own: an
//! `UPDATE ... RETURNING` inside a transaction holds the row until commit or
//! rollback.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres, Transaction};

use super::{LedgerStore, LedgerTx, Queries};
use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer, User, check_page,
};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const USER_COLUMNS: &str = "username, full_name, email, hashed_password, created_at";

/// PostgreSQL-backed store sharing one pool across all handles
#[derive(Clone)]
pub struct PgLedgerStore {
    db: Database,
}

impl PgLedgerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn acquire(&self) -> Result<Box<dyn Queries>> {
        let conn = self.db.pool().acquire().await?;
        Ok(Box::new(PgHandle {
            conn: Conn::Pooled(conn),
        }))
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.db.pool().begin().await?;
        Ok(Box::new(PgHandle { conn: Conn::Tx(tx) }))
    }

    async fn ping(&self) -> Result<()> {
        self.db.health_check().await?;
        Ok(())
    }
}

enum Conn {
    Pooled(PoolConnection<Postgres>),
    Tx(Transaction<'static, Postgres>),
    Finished,
}

/// A pooled connection or an open transaction
///
/// Both release their connection back to the pool on drop; an unfinished
/// transaction is rolled back by sqlx when dropped.
pub struct PgHandle {
    conn: Conn,
}

impl PgHandle {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        match &mut self.conn {
            Conn::Pooled(conn) => Ok(&mut **conn),
            Conn::Tx(tx) => Ok(&mut **tx),
            Conn::Finished => Err(LedgerError::internal("transaction already finished")),
        }
    }
}

impl Drop for PgHandle {
    fn drop(&mut self) {
        if matches!(self.conn, Conn::Tx(_)) {
            tracing::debug!("PostgreSQL transaction dropped before commit, rolling back");
        }
    }
}

#[async_trait]
impl Queries for PgHandle {
    async fn create_user(&mut self, params: CreateUserParams) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (username, hashed_password, full_name, email) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&params.username)
            .bind(&params.hashed_password)
            .bind(&params.full_name)
            .bind(&params.email)
            .fetch_one(self.conn()?)
            .await?;
        Ok(user)
    }

    async fn get_user(&mut self, username: &str) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 LIMIT 1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("user {}", username)))
    }

    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account> {
        let sql = format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(&params.owner)
            .bind(params.balance)
            .bind(&params.currency)
            .fetch_one(self.conn()?)
            .await?;
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("account {}", id)))
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account> {
        // NO KEY UPDATE leaves FK checks from entry/transfer inserts unblocked
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1 FOR NO KEY UPDATE"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("account {}", id)))
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>> {
        check_page(params.limit, params.offset)?;
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .bind(&params.owner)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(self.conn()?)
            .await?;
        Ok(accounts)
    }

    async fn update_account(&mut self, id: i64, balance: i64) -> Result<Account> {
        let sql = format!("UPDATE accounts SET balance = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}");
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .bind(balance)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("account {}", id)))
    }

    async fn add_account_balance(&mut self, id: i64, amount: i64) -> Result<Account> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(amount)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("account {}", id)))
    }

    async fn delete_account(&mut self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("account {}", id)));
        }
        Ok(())
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        let sql = format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        );
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(params.account_id)
            .bind(params.amount)
            .fetch_one(self.conn()?)
            .await?;
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Entry>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("entry {}", id)))
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>> {
        check_page(params.limit, params.offset)?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let entries = sqlx::query_as::<_, Entry>(&sql)
            .bind(params.account_id)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(self.conn()?)
            .await?;
        Ok(entries)
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        let sql = format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) \
             VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        );
        let transfer = sqlx::query_as::<_, Transfer>(&sql)
            .bind(params.from_account_id)
            .bind(params.to_account_id)
            .bind(params.amount)
            .fetch_one(self.conn()?)
            .await?;
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Transfer>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("transfer {}", id)))
    }

    async fn list_transfers(&mut self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        check_page(params.limit, params.offset)?;
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers \
             WHERE from_account_id = $1 OR to_account_id = $2 \
             ORDER BY id LIMIT $3 OFFSET $4"
        );
        let transfers = sqlx::query_as::<_, Transfer>(&sql)
            .bind(params.from_account_id)
            .bind(params.to_account_id)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(self.conn()?)
            .await?;
        Ok(transfers)
    }
}

#[async_trait]
impl LedgerTx for PgHandle {
    async fn commit(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.conn, Conn::Finished) {
            Conn::Tx(tx) => {
                tx.commit().await?;
                Ok(())
            }
            // autocommit handles have nothing pending
            Conn::Pooled(conn) => {
                self.conn = Conn::Pooled(conn);
                Ok(())
            }
            Conn::Finished => Err(LedgerError::internal("transaction already finished")),
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.conn, Conn::Finished) {
            Conn::Tx(tx) => {
                tx.rollback().await?;
                Ok(())
            }
            Conn::Pooled(conn) => {
                self.conn = Conn::Pooled(conn);
                Ok(())
            }
            Conn::Finished => Err(LedgerError::internal("transaction already finished")),
        }
    }
}
