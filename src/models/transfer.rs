use serde::{Deserialize, Serialize};

use crate::models::errors::TransferError;
use crate::types::{AccountId, Monetary, TransferId};

/// Audit record of a completed transfer, written inside the transfer transaction.
///
/// Never updated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: TransferId,
    /// Receiving account.
    pub to_account: AccountId,
    /// Sending account.
    pub from_account: AccountId,
    /// Stored as `Decimal128`.
    pub amount: Monetary
}

impl Transfer {
    pub fn new(transfer_id: &str, from_account: AccountId, to_account: AccountId, amount: Monetary) -> Self {
        Self {
            transfer_id: transfer_id.to_string(),
            to_account,
            from_account,
            amount
        }
    }

    /// Checks the request itself; says nothing about the accounts it names.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.amount.is_negative() {
            return Err(TransferError::negative_amount(self))
        }

        if self.from_account == self.to_account {
            return Err(TransferError::same_account(self))
        }

        Ok(())
    }
}
