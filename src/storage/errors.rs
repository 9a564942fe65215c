use bson::Bson;
use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use thiserror::Error;

use crate::query::QueryError;
use crate::storage::Namespace;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store error: {0}")]
    Driver(#[from] mongodb::error::Error),
    #[error("Store error: {0}")]
    Query(#[from] QueryError),
    #[error("Store error: duplicate _id {id} in [{namespace}]")]
    DuplicateKey {
        namespace: Namespace,
        id: Bson
    },
    #[cfg(test)]
    #[error("Store error: write conflict in [{namespace}]")]
    WriteConflict {
        namespace: Namespace
    },
    #[cfg(test)]
    #[error("Store error: commit result unknown for [{namespace}]")]
    CommitResultUnknown {
        namespace: Namespace
    },
    #[cfg(test)]
    #[error("Store error: cannot apply update in [{namespace}]: {reason}")]
    InvalidUpdate {
        namespace: Namespace,
        reason: String
    },
    #[error("Store error: insert into [{namespace}] stopped after {} document(s): {source}", .inserted.len())]
    PartialInsert {
        namespace: Namespace,
        inserted: Vec<Bson>,
        #[source]
        source: Box<StoreError>
    },
    #[error("Store error: transaction is no longer active")]
    TransactionClosed
}

impl StoreError {
    /// The whole transaction may be retried from the start.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Driver(error) => error.contains_label(TRANSIENT_TRANSACTION_ERROR),
            #[cfg(test)]
            StoreError::WriteConflict { .. } => true,
            _ => false
        }
    }

    /// The commit may or may not have applied; retrying the commit is safe.
    pub fn is_unknown_commit_result(&self) -> bool {
        match self {
            StoreError::Driver(error) => error.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT),
            #[cfg(test)]
            StoreError::CommitResultUnknown { .. } => true,
            _ => false
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        match self {
            StoreError::DuplicateKey { .. } => true,
            StoreError::PartialInsert { source, .. } => source.is_duplicate_key(),
            StoreError::Driver(error) => match error.kind.as_ref() {
                ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY_CODE,
                ErrorKind::InsertMany(failure) => failure.write_errors.iter()
                    .flatten()
                    .any(|write_error| write_error.code == DUPLICATE_KEY_CODE),
                _ => false
            },
            _ => false
        }
    }
}
