use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonetaryError {
    #[error("Monetary error: {0}")]
    InvalidFormat(String),
    #[error("Monetary error: Overflow")]
    Overflow,
    #[error("Monetary error: {0} is not representable as a decimal")]
    NotRepresentable(String),
    #[error("Monetary error: cannot read a monetary value from BSON {0}")]
    UnsupportedType(String)
}
