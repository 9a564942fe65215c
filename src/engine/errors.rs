use std::time::Duration;

use thiserror::Error;

use crate::models::TransferError;
use crate::storage::StoreError;
use crate::types::{MonetaryError, TransferId};

/// Why a transfer transaction ended without committing. Nothing it wrote is visible.
#[derive(Debug, Error)]
pub enum AbortReason {
    #[error("write conflicts persisted until the retry window closed: {0}")]
    RetryableConflict(StoreError),
    #[error("exceeded the {0:?} transaction lifetime")]
    Timeout(Duration),
    #[error(transparent)]
    Rejected(TransferError),
    #[error(transparent)]
    Store(StoreError)
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Transfer rejected before starting: {0}")]
    Invalid(#[from] TransferError),
    #[error("Transfer audit record could not be serialized: {0}")]
    Serialization(#[from] bson::ser::Error),
    #[error("Transfer amount cannot be stored: {0}")]
    Amount(#[from] MonetaryError),
    #[error("Transaction for transfer [{transfer_id}] aborted after {attempts} attempt(s): {reason}")]
    Aborted {
        transfer_id: TransferId,
        attempts: u32,
        #[source]
        reason: AbortReason
    }
}
