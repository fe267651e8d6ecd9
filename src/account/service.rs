//! Account service

use crate::error::Result;
use crate::ledger::Ledger;
use crate::models::{Account, CreateAccountParams, ListAccountsParams, normalize_currency};

/// Account operations exposed to the gateway
#[derive(Clone)]
pub struct AccountService {
    ledger: Ledger,
}

impl AccountService {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Open a zero-balance account for `owner` in `currency`
    ///
    /// Fails with `ConstraintViolation` when the owner already holds an
    /// account in that currency or does not exist.
    pub async fn create_account(&self, owner: &str, currency: &str) -> Result<Account> {
        let currency = normalize_currency(currency)?;
        let mut conn = self.ledger.acquire().await?;
        let account = conn
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                currency,
                balance: 0,
            })
            .await?;

        tracing::info!(
            account_id = account.id,
            owner = %account.owner,
            currency = %account.currency,
            "Account created"
        );
        Ok(account)
    }

    pub async fn get_account(&self, id: i64) -> Result<Account> {
        let mut conn = self.ledger.acquire().await?;
        conn.get_account(id).await
    }

    pub async fn list_accounts(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let mut conn = self.ledger.acquire().await?;
        conn.list_accounts(ListAccountsParams {
            owner: owner.to_string(),
            limit,
            offset,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::models::CreateUserParams;

    async fn service_with_user(username: &str) -> AccountService {
        let ledger = Ledger::memory();
        let mut conn = ledger.acquire().await.unwrap();
        conn.create_user(CreateUserParams {
            username: username.to_string(),
            full_name: username.to_string(),
            email: format!("{}@example.com", username),
            hashed_password: "hash".to_string(),
        })
        .await
        .unwrap();
        AccountService::new(ledger)
    }

    #[tokio::test]
    async fn test_create_account_starts_at_zero() {
        let service = service_with_user("alice").await;
        let account = service.create_account("alice", "usd").await.unwrap();
        assert_eq!(account.owner, "alice");
        assert_eq!(account.currency, "USD");
        assert_eq!(account.balance, 0);
        assert_eq!(service.get_account(account.id).await.unwrap(), account);
    }

    #[tokio::test]
    async fn test_create_account_rejects_unsupported_currency() {
        let service = service_with_user("alice").await;
        let err = service.create_account("alice", "BTC").await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_account_duplicate_currency() {
        let service = service_with_user("alice").await;
        service.create_account("alice", "USD").await.unwrap();
        let err = service.create_account("alice", "USD").await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_list_accounts_by_owner() {
        let service = service_with_user("alice").await;
        for currency in ["USD", "EUR", "CAD"] {
            service.create_account("alice", currency).await.unwrap();
        }

        let all = service.list_accounts("alice", 5, 0).await.unwrap();
        assert_eq!(
            all.iter().map(|a| a.currency.as_str()).collect::<Vec<_>>(),
            vec!["USD", "EUR", "CAD"]
        );
        let second_page = service.list_accounts("alice", 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert!(service.list_accounts("bob", 5, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_account() {
        let service = service_with_user("alice").await;
        assert!(service.get_account(42).await.unwrap_err().is_not_found());
    }
}
