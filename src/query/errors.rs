use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query error: an update needs at least one $inc, $set or $push operation")]
    EmptyUpdate
}
