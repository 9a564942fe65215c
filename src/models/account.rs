use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::Products;
use crate::types::{AccountId, Monetary};

/// A customer account document.
///
/// `account_id` is an opaque integer; leading zeros in sample data carry no meaning.
/// `balance` only appears once a transfer has touched the account, and
/// `min_limit` once the bulk update has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Store identity. Generated by the store when absent.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub account_id: AccountId,
    pub limit: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Monetary>,
    #[serde(default)]
    pub products: Products,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transfers_complete: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_limit: Option<i64>
}

impl Account {
    pub fn new(account_id: AccountId, limit: i64, products: Products) -> Self {
        Self {
            id: None,
            account_id,
            limit,
            account_type: None,
            balance: None,
            products,
            transfers_complete: Vec::new(),
            min_limit: None
        }
    }

    #[cfg(test)]
    pub fn with_balance(mut self, account_type: &str, balance: Monetary) -> Self {
        self.account_type = Some(account_type.to_string());
        self.balance = Some(balance);
        self
    }
}
