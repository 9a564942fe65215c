pub mod decimal128;
mod errors;
mod monetary;

pub use errors::MonetaryError;
pub use monetary::Monetary;

pub type AccountId = i64;
pub type TransferId = String;
