use std::fmt;
use std::fmt::{Display, Formatter};

use bson::{Bson, Document};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::TransferPolicy;
use crate::engine::{AbortReason, TransactionError};
use crate::models::{Transfer, TransferError};
use crate::query::{Filter, Update};
use crate::storage::{DocumentStore, Namespace, StoreError, StoreTransaction};
use crate::types::{AccountId, TransferId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Started,
    Executing(u8),
    Committed,
    Aborted
}

impl Display for TransactionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Started => write!(formatter, "started"),
            TransactionState::Executing(step) => write!(formatter, "executing step {step}/3"),
            TransactionState::Committed => write!(formatter, "committed"),
            TransactionState::Aborted => write!(formatter, "aborted")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    pub attempts: u32
}

/// Moves funds between two accounts and records the transfer, atomically.
///
/// The three writes (debit sender, credit receiver, insert audit record) share one
/// transaction. Transient conflicts restart the whole transaction after a short
/// backoff, an unknown commit result retries the commit, and everything is bounded
/// by `TransferPolicy::max_duration`. A debit or credit that matches no account
/// aborts the transaction, so a transfer is never half applied.
pub struct TransferOrchestrator {
    accounts: Namespace,
    transfers: Namespace,
    policy: TransferPolicy
}

impl TransferOrchestrator {
    pub fn new(accounts: Namespace, transfers: Namespace, policy: TransferPolicy) -> Self {
        Self {
            accounts,
            transfers,
            policy
        }
    }

    pub async fn execute(&self, store: &dyn DocumentStore, transfer: &Transfer) -> Result<TransferReceipt, TransactionError> {
        transfer.validate()?;

        let audit = bson::to_document(transfer)?;
        let legs = [
            (transfer.from_account, (-transfer.amount).to_bson()?),
            (transfer.to_account, transfer.amount.to_bson()?)
        ];
        let deadline = Instant::now() + self.policy.max_duration;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match timeout_at(deadline, self.attempt(store, transfer, &legs, &audit, attempts)).await {
                Ok(Ok(())) => {
                    info!("Transfer [{}] committed after {attempts} attempt(s)", transfer.transfer_id);

                    return Ok(TransferReceipt {
                        transfer_id: transfer.transfer_id.clone(),
                        attempts
                    });
                }
                Ok(Err(AbortReason::Store(error))) if error.is_transient() => error,
                Ok(Err(reason)) => return Err(aborted(transfer, attempts, reason)),
                Err(_) => {
                    warn!("Transfer [{}] timed out during attempt {attempts}", transfer.transfer_id);
                    return Err(aborted(transfer, attempts, AbortReason::Timeout(self.policy.max_duration)));
                }
            };

            if Instant::now() + self.policy.retry_backoff >= deadline {
                return Err(aborted(transfer, attempts, AbortReason::RetryableConflict(error)));
            }

            warn!("Transfer [{}] attempt {attempts} hit a transient error, retrying: {error}", transfer.transfer_id);
            sleep(self.policy.retry_backoff).await;
        }
    }

    async fn attempt(&self, store: &dyn DocumentStore, transfer: &Transfer, legs: &[(AccountId, Bson)], audit: &Document, attempt: u32) -> Result<(), AbortReason> {
        let mut transaction = store.begin().await.map_err(AbortReason::Store)?;
        log_state(transfer, attempt, TransactionState::Started);

        if let Err(reason) = self.apply_writes(transaction.as_mut(), transfer, legs, audit, attempt).await {
            if let Err(error) = transaction.abort().await {
                warn!("Transfer [{}] abort failed, the server will expire the transaction: {error}", transfer.transfer_id);
            }

            log_state(transfer, attempt, TransactionState::Aborted);
            return Err(reason);
        }

        commit(transaction.as_mut(), transfer).await.map_err(AbortReason::Store)?;
        log_state(transfer, attempt, TransactionState::Committed);

        Ok(())
    }

    async fn apply_writes(&self, transaction: &mut (dyn StoreTransaction + '_), transfer: &Transfer, legs: &[(AccountId, Bson)], audit: &Document, attempt: u32) -> Result<(), AbortReason> {
        for (step, (account_id, delta)) in (1u8..).zip(legs) {
            log_state(transfer, attempt, TransactionState::Executing(step));

            let update = Update::new()
                .increment("balance", delta.clone())
                .push("transfers_complete", transfer.transfer_id.as_str());

            let outcome = transaction.update_one(&self.accounts, &Filter::eq("account_id", *account_id), &update).await
                .map_err(AbortReason::Store)?;

            if outcome.matched_count == 0 {
                return Err(AbortReason::Rejected(TransferError::account_not_found(transfer, *account_id)));
            }
        }

        log_state(transfer, attempt, TransactionState::Executing(3));
        transaction.insert_one(&self.transfers, audit.clone()).await.map_err(AbortReason::Store)?;

        Ok(())
    }
}

async fn commit(transaction: &mut (dyn StoreTransaction + '_), transfer: &Transfer) -> Result<(), StoreError> {
    loop {
        match transaction.commit().await {
            Err(error) if error.is_unknown_commit_result() => {
                warn!("Transfer [{}] commit result unknown, retrying commit: {error}", transfer.transfer_id);
            }
            result => return result
        }
    }
}

fn log_state(transfer: &Transfer, attempt: u32, state: TransactionState) {
    debug!("Transfer [{}] attempt {attempt}: {state}", transfer.transfer_id);
}

fn aborted(transfer: &Transfer, attempts: u32, reason: AbortReason) -> TransactionError {
    TransactionError::Aborted {
        transfer_id: transfer.transfer_id.clone(),
        attempts,
        reason
    }
}
