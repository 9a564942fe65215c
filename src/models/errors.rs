use crate::models::Transfer;
use crate::types::{AccountId, Monetary, TransferId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Amount [{amount}] must not be negative for transfer [{transfer_id}]")]
    NegativeAmount {
        transfer_id: TransferId,
        amount: Monetary
    },
    #[error("Transfer [{transfer_id}] sends from and to the same account [{account_id}]")]
    SameAccount {
        transfer_id: TransferId,
        account_id: AccountId
    },
    #[error("Account [{account_id}] was not found for transfer [{transfer_id}]")]
    AccountNotFound {
        transfer_id: TransferId,
        account_id: AccountId
    }
}

impl TransferError {
    pub fn negative_amount(transfer: &Transfer) -> Self {
        Self::NegativeAmount {
            transfer_id: transfer.transfer_id.clone(),
            amount: transfer.amount
        }
    }

    pub fn same_account(transfer: &Transfer) -> Self {
        Self::SameAccount {
            transfer_id: transfer.transfer_id.clone(),
            account_id: transfer.from_account
        }
    }

    pub fn account_not_found(transfer: &Transfer, account_id: AccountId) -> Self {
        Self::AccountNotFound {
            transfer_id: transfer.transfer_id.clone(),
            account_id
        }
    }
}
