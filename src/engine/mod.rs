mod errors;
mod report;
mod tour;
mod transfer;

pub use errors::{AbortReason, TransactionError};
pub use report::Reporter;
pub use tour::Tour;
pub use transfer::TransferOrchestrator;
