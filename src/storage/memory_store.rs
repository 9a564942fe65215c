use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::debug;

use crate::query::{Filter, Pipeline, Update};
use crate::storage::evaluator;
use crate::storage::{ensure_id, DocumentStore, DocumentStream, Namespace, StoreError, StoreTransaction, TransactionPhase, UpdateOutcome};

/// In-process `DocumentStore` for tests.
///
/// Collections keep insertion order, so "first match" is the oldest matching
/// document. Transactions stage whole collections and swap them in on commit.
pub struct MemoryStore {
    collections: DashMap<Namespace, Vec<Document>>,
    pending_conflicts: AtomicUsize,
    pending_unknown_commits: AtomicUsize,
    commit_delay: Option<Duration>
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            pending_conflicts: AtomicUsize::new(0),
            pending_unknown_commits: AtomicUsize::new(0),
            commit_delay: None
        }
    }

    /// The next `count` commits fail with a transient write conflict.
    pub fn with_write_conflicts(self, count: usize) -> Self {
        self.pending_conflicts.store(count, Ordering::SeqCst);
        self
    }

    /// The next `count` commit calls report an unknown commit result. The
    /// first one still applies the staged writes; later calls on the same
    /// transaction apply nothing.
    pub fn with_unknown_commit_results(self, count: usize) -> Self {
        self.pending_unknown_commits.store(count, Ordering::SeqCst);
        self
    }

    /// Every commit waits this long before applying.
    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }

    pub fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        self.collections.get(namespace).map(|documents| documents.clone()).unwrap_or_default()
    }

    pub fn count(&self, namespace: &Namespace, filter: &Filter) -> usize {
        self.documents(namespace).iter().filter(|document| evaluator::matches(document, filter)).count()
    }
}

fn take_one(pending: &AtomicUsize) -> bool {
    pending.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| pending.checked_sub(1)).is_ok()
}

fn insert_into(namespace: &Namespace, documents: &mut Vec<Document>, document: Document) -> Result<Bson, StoreError> {
    let (id, document) = ensure_id(document);

    if documents.iter().any(|existing| existing.get("_id") == Some(&id)) {
        return Err(StoreError::DuplicateKey { namespace: namespace.clone(), id });
    }

    documents.push(document);

    Ok(id)
}

fn update_in(namespace: &Namespace, documents: &mut [Document], filter: &Filter, update: &Update, limit: Option<usize>) -> Result<UpdateOutcome, StoreError> {
    update.to_document()?;

    let mut outcome = UpdateOutcome::default();

    for document in documents.iter_mut().filter(|document| evaluator::matches(document, filter)) {
        if limit.is_some_and(|limit| outcome.matched_count as usize >= limit) {
            break;
        }

        outcome.matched_count += 1;

        let changed = evaluator::apply(document, update)
            .map_err(|reason| StoreError::InvalidUpdate { namespace: namespace.clone(), reason })?;

        if changed {
            outcome.modified_count += 1;
        }
    }

    Ok(outcome)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError> {
        let names: BTreeSet<String> = self.collections.iter().map(|entry| entry.key().database.clone()).collect();
        Ok(names.into_iter().collect())
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> Result<Bson, StoreError> {
        let mut documents = self.collections.entry(namespace.clone()).or_default();
        insert_into(namespace, &mut documents, document)
    }

    async fn insert_many(&self, namespace: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>, StoreError> {
        let mut stored = self.collections.entry(namespace.clone()).or_default();
        let mut inserted = Vec::with_capacity(documents.len());

        for document in documents {
            match insert_into(namespace, &mut stored, document) {
                Ok(id) => inserted.push(id),
                Err(error) => {
                    return Err(StoreError::PartialInsert {
                        namespace: namespace.clone(),
                        inserted,
                        source: Box::new(error)
                    });
                }
            }
        }

        Ok(inserted)
    }

    async fn find_one(&self, namespace: &Namespace, filter: &Filter) -> Result<Option<Document>, StoreError> {
        Ok(self.documents(namespace).into_iter().find(|document| evaluator::matches(document, filter)))
    }

    async fn find(&self, namespace: &Namespace, filter: &Filter) -> Result<DocumentStream, StoreError> {
        let matching: Vec<Document> = self.documents(namespace).into_iter()
            .filter(|document| evaluator::matches(document, filter))
            .collect();

        Ok(stream::iter(matching.into_iter().map(Ok)).boxed())
    }

    async fn update_one(&self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError> {
        let mut documents = self.collections.entry(namespace.clone()).or_default();
        update_in(namespace, &mut documents, filter, update, Some(1))
    }

    async fn update_many(&self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError> {
        let mut documents = self.collections.entry(namespace.clone()).or_default();
        update_in(namespace, &mut documents, filter, update, None)
    }

    async fn delete_one(&self, namespace: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        let Some(mut documents) = self.collections.get_mut(namespace) else {
            return Ok(0);
        };

        match documents.iter().position(|document| evaluator::matches(document, filter)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0)
        }
    }

    async fn delete_many(&self, namespace: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        let Some(mut documents) = self.collections.get_mut(namespace) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|document| !evaluator::matches(document, filter));

        Ok((before - documents.len()) as u64)
    }

    async fn aggregate(&self, namespace: &Namespace, pipeline: &Pipeline) -> Result<DocumentStream, StoreError> {
        let results = evaluator::run(self.documents(namespace), pipeline);
        Ok(stream::iter(results.into_iter().map(Ok)).boxed())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            staged: HashMap::new(),
            committed_to: Vec::new(),
            phase: TransactionPhase::Open
        }))
    }

    async fn close(&self) {}
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: HashMap<Namespace, Vec<Document>>,
    committed_to: Vec<Namespace>,
    phase: TransactionPhase
}

impl MemoryTransaction<'_> {
    fn staged(&mut self, namespace: &Namespace) -> Result<&mut Vec<Document>, StoreError> {
        if self.phase != TransactionPhase::Open {
            return Err(StoreError::TransactionClosed);
        }

        let store = self.store;

        Ok(self.staged.entry(namespace.clone()).or_insert_with(|| store.documents(namespace)))
    }

    /// Outcome of a commit whose writes are already applied.
    fn report_commit(&self) -> Result<(), StoreError> {
        if take_one(&self.store.pending_unknown_commits) {
            let namespace = self.committed_to.first().cloned().unwrap_or_else(|| Namespace::new("", ""));
            return Err(StoreError::CommitResultUnknown { namespace });
        }

        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction<'_> {
    async fn update_one(&mut self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError> {
        let documents = self.staged(namespace)?;
        update_in(namespace, documents, filter, update, Some(1))
    }

    async fn insert_one(&mut self, namespace: &Namespace, document: Document) -> Result<Bson, StoreError> {
        let documents = self.staged(namespace)?;
        insert_into(namespace, documents, document)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        match self.phase {
            TransactionPhase::Open => {}
            TransactionPhase::Committed => return self.report_commit(),
            TransactionPhase::Aborted => return Err(StoreError::TransactionClosed)
        }

        if let Some(delay) = self.store.commit_delay {
            sleep(delay).await;
        }

        if take_one(&self.store.pending_conflicts) {
            let namespace = self.staged.keys().next().cloned().unwrap_or_else(|| Namespace::new("", ""));
            self.phase = TransactionPhase::Aborted;
            self.staged.clear();
            return Err(StoreError::WriteConflict { namespace });
        }

        for (namespace, documents) in self.staged.drain() {
            debug!("Committing {} document(s) to [{namespace}]", documents.len());
            self.store.collections.insert(namespace.clone(), documents);
            self.committed_to.push(namespace);
        }

        self.phase = TransactionPhase::Committed;
        self.report_commit()
    }

    async fn abort(&mut self) -> Result<(), StoreError> {
        if self.phase != TransactionPhase::Open {
            return Err(StoreError::TransactionClosed);
        }

        self.phase = TransactionPhase::Aborted;
        self.staged.clear();
        Ok(())
    }
}
