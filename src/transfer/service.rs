//! Transfer Service
//!
//! Validates a [`TransferParams`], then runs the five dependent writes inside
//! one [`LedgerTx`] and settles it.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::types::TransferParams;
use crate::error::{LedgerError, Result};
use crate::ledger::{Ledger, settle};
use crate::models::{Account, CreateEntryParams, CreateTransferParams, TransferResult};
use crate::store::LedgerTx;

/// Transfer Orchestrator over a shared [`Ledger`]
#[derive(Clone)]
pub struct TransferService {
    ledger: Ledger,
}

impl TransferService {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Move `amount` from one account to another atomically
    ///
    /// # Errors
    /// - `Validation`: non-positive amount, self-transfer or currency mismatch
    /// - `NotFound`: either account does not exist
    /// - `InsufficientFunds`: the debit would overdraw the source account
    /// - anything the store raises while the unit is open, after rollback
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult> {
        self.validate(&params).await?;

        let mut tx = self.ledger.begin().await?;
        let result = execute(tx.as_mut(), &params).await;
        let outcome = settle(tx, result).await;

        match &outcome {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                "Transfer committed"
            ),
            Err(e) => warn!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                error = %e,
                "Transfer rolled back"
            ),
        }
        outcome
    }

    /// [`Self::transfer`] bounded by a deadline
    ///
    /// On expiry the in-flight unit is dropped, which rolls it back and
    /// releases its row locks, and `Timeout` is returned.
    pub async fn transfer_with_deadline(
        &self,
        params: TransferParams,
        deadline: Duration,
    ) -> Result<TransferResult> {
        match tokio::time::timeout(deadline, self.transfer(params)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let ms = deadline_ms(deadline);
                warn!(
                    from = params.from_account_id,
                    to = params.to_account_id,
                    amount = params.amount,
                    deadline_ms = ms,
                    "Transfer deadline exceeded, rolled back"
                );
                Err(LedgerError::Timeout(ms))
            }
        }
    }

    /// Reject bad input before a unit of work is opened
    async fn validate(&self, params: &TransferParams) -> Result<()> {
        if params.amount <= 0 {
            return Err(LedgerError::validation("amount must be positive"));
        }
        if params.from_account_id == params.to_account_id {
            return Err(LedgerError::validation(
                "cannot transfer to the same account",
            ));
        }

        let mut conn = self.ledger.acquire().await?;
        let from = conn.get_account(params.from_account_id).await?;
        let to = conn.get_account(params.to_account_id).await?;
        if from.currency != to.currency {
            return Err(LedgerError::validation(format!(
                "currency mismatch: account {} is {}, account {} is {}",
                from.id, from.currency, to.id, to.currency
            )));
        }

        debug!(
            from = from.id,
            to = to.id,
            currency = %from.currency,
            "Transfer validated"
        );
        Ok(())
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn deadline_ms(deadline: Duration) -> u64 {
    u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX)
}

async fn execute(tx: &mut dyn LedgerTx, params: &TransferParams) -> Result<TransferResult> {
    let transfer = tx
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = tx
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = tx
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let (from_account, to_account) = apply_balances(tx, params).await?;

    if from_account.balance < 0 {
        return Err(LedgerError::InsufficientFunds {
            account_id: from_account.id,
            balance: from_account.balance + params.amount,
            amount: params.amount,
        });
    }

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply both balance deltas in lock order; returns `(from, to)`
async fn apply_balances(
    tx: &mut dyn LedgerTx,
    params: &TransferParams,
) -> Result<(Account, Account)> {
    let delta = |account_id: i64| {
        if account_id == params.from_account_id {
            -params.amount
        } else {
            params.amount
        }
    };

    let [first, second] = params.lock_order();
    let first_account = tx.add_account_balance(first, delta(first)).await?;
    let second_account = tx.add_account_balance(second, delta(second)).await?;

    if first == params.from_account_id {
        Ok((first_account, second_account))
    } else {
        Ok((second_account, first_account))
    }
}
