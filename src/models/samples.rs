//! The fixed documents the tour writes and looks up.

use bson::oid::ObjectId;

use crate::models::{Account, Products, Transfer};
use crate::types::{AccountId, Monetary};

/// `5ca4bbc7a2dd94ee5816238f`, an account shipped with the sample dataset.
pub const KNOWN_ACCOUNT_ID: ObjectId = ObjectId::from_bytes([
    0x5c, 0xa4, 0xbb, 0xc7, 0xa2, 0xdd, 0x94, 0xee, 0x58, 0x16, 0x23, 0x8f
]);

pub const TRANSFER_ID: &str = "TR218721873";
pub const SENDER_ACCOUNT: AccountId = 574189300;
pub const RECEIVER_ACCOUNT: AccountId = 343652528;
pub const TRANSFER_UNITS: i64 = 100;

pub fn new_account() -> Account {
    Account::new(1, 1500, Products::new(["InvestmentStock"]))
}

pub fn new_accounts() -> Vec<Account> {
    vec![
        Account::new(2, 2500, Products::new(["CurrencyService", "InvestmentStock"])),
        Account::new(3, 2500, Products::new(["InvestmentFund", "InvestmentStock"]))
    ]
}

pub fn transfer() -> Transfer {
    Transfer::new(TRANSFER_ID, SENDER_ACCOUNT, RECEIVER_ACCOUNT, Monetary::from_units(TRANSFER_UNITS))
}
