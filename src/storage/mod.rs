mod errors;
#[cfg(test)]
mod evaluator;
#[cfg(test)]
mod memory_store;
mod mongo_store;

use std::fmt;
use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use futures::stream::BoxStream;

use crate::query::{Filter, Pipeline, Update};

pub use errors::StoreError;
#[cfg(test)]
pub use memory_store::MemoryStore;
pub use mongo_store::MongoStore;

/// Lazily produced, finite results. Draining consumes it; it cannot be restarted.
pub type DocumentStream = BoxStream<'static, Result<Document, StoreError>>;

/// `database.collection`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String
}

impl Namespace {
    pub fn new(database: &str, collection: &str) -> Self {
        Self {
            database: database.to_string(),
            collection: collection.to_string()
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.database, self.collection)
    }
}

/// Returns the document's `_id`, adding a fresh `ObjectId` first when it has none.
pub(crate) fn ensure_id(document: Document) -> (Bson, Document) {
    if let Some(id) = document.get("_id") {
        return (id.clone(), document);
    }

    let id = Bson::ObjectId(ObjectId::new());
    let mut identified = Document::new();
    identified.insert("_id", id.clone());

    for (key, value) in document {
        identified.insert(key, value);
    }

    (id, identified)
}

/// Where a transaction is in its life. Writes are only accepted while `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionPhase {
    Open,
    Committed,
    Aborted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64
}

/// Client side of a document store.
///
/// Every request is a single round trip; nothing here retries. Filters passed
/// to `delete_one` and `delete_many` may be `Filter::everything()`, which
/// deletes an arbitrary document or every document respectively.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError>;

    /// Returns the stored `_id`, generated when the document has none.
    /// Fails if a document with the same `_id` exists.
    async fn insert_one(&self, namespace: &Namespace, document: Document) -> Result<Bson, StoreError>;

    /// Ordered insert. Stops at the first failure and reports the ids stored
    /// before it through `StoreError::PartialInsert`.
    async fn insert_many(&self, namespace: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>, StoreError>;

    async fn find_one(&self, namespace: &Namespace, filter: &Filter) -> Result<Option<Document>, StoreError>;

    async fn find(&self, namespace: &Namespace, filter: &Filter) -> Result<DocumentStream, StoreError>;

    async fn update_one(&self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError>;

    async fn update_many(&self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError>;

    async fn delete_one(&self, namespace: &Namespace, filter: &Filter) -> Result<u64, StoreError>;

    async fn delete_many(&self, namespace: &Namespace, filter: &Filter) -> Result<u64, StoreError>;

    async fn aggregate(&self, namespace: &Namespace, pipeline: &Pipeline) -> Result<DocumentStream, StoreError>;

    /// Opens a multi-document transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;

    async fn close(&self);
}

/// Writes bound to one transaction. Dropping it without `commit` discards them.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn update_one(&mut self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError>;

    async fn insert_one(&mut self, namespace: &Namespace, document: Document) -> Result<Bson, StoreError>;

    /// Calling it again after a commit succeeded is allowed and applies nothing new.
    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn abort(&mut self) -> Result<(), StoreError>;
}
