mod account;
mod errors;
mod products;
pub mod samples;
mod transfer;

pub use account::Account;
pub use errors::TransferError;
pub use products::Products;
pub use transfer::Transfer;
