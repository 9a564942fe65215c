use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession, Collection};
use tracing::{debug, info, warn};

use crate::query::{Filter, Pipeline, Update};
use crate::storage::{ensure_id, DocumentStore, DocumentStream, Namespace, StoreError, StoreTransaction, TransactionPhase, UpdateOutcome};

const APP_NAME: &str = "mongo-tour";

/// `DocumentStore` over the official driver. One client, created once and
/// shared by every request until `close`.
pub struct MongoStore {
    client: Client
}

impl MongoStore {
    /// Parses the URI and builds the client. The driver connects lazily, so
    /// an unreachable server surfaces on the first request.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some(APP_NAME.to_string());

        info!("Connecting to {} host(s)", options.hosts.len());

        let client = Client::with_options(options)?;

        Ok(Self { client })
    }

    fn collection(&self, namespace: &Namespace) -> Collection<Document> {
        collection(&self.client, namespace)
    }

    #[cfg(test)]
    pub async fn drop_collection(&self, namespace: &Namespace) -> Result<(), StoreError> {
        self.collection(namespace).drop().await?;
        Ok(())
    }
}

fn collection(client: &Client, namespace: &Namespace) -> Collection<Document> {
    client.database(&namespace.database).collection(&namespace.collection)
}

fn insert_failed(namespace: &Namespace, id: Bson, error: mongodb::error::Error) -> StoreError {
    let error = StoreError::from(error);

    if error.is_duplicate_key() {
        return StoreError::DuplicateKey { namespace: namespace.clone(), id };
    }

    error
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_database_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.client.list_database_names().await?)
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> Result<Bson, StoreError> {
        let (id, document) = ensure_id(document);

        self.collection(namespace).insert_one(document).await
            .map_err(|error| insert_failed(namespace, id.clone(), error))?;

        Ok(id)
    }

    async fn insert_many(&self, namespace: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>, StoreError> {
        // Ids are assigned here so a failed ordered insert can report the stored prefix
        let (ids, documents): (Vec<Bson>, Vec<Document>) = documents.into_iter().map(ensure_id).unzip();

        match self.collection(namespace).insert_many(&documents).await {
            Ok(_) => Ok(ids),
            Err(error) => {
                let stored = match error.kind.as_ref() {
                    ErrorKind::InsertMany(failure) => failure.write_errors.as_ref()
                        .and_then(|write_errors| write_errors.iter().map(|write_error| write_error.index).min())
                        .unwrap_or(0),
                    _ => 0
                };

                Err(StoreError::PartialInsert {
                    namespace: namespace.clone(),
                    inserted: ids[..stored.min(ids.len())].to_vec(),
                    source: Box::new(error.into())
                })
            }
        }
    }

    async fn find_one(&self, namespace: &Namespace, filter: &Filter) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(namespace).find_one(filter.to_document()).await?)
    }

    async fn find(&self, namespace: &Namespace, filter: &Filter) -> Result<DocumentStream, StoreError> {
        let cursor = self.collection(namespace).find(filter.to_document()).await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn update_one(&self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError> {
        let result = self.collection(namespace).update_one(filter.to_document(), update.to_document()?).await?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count
        })
    }

    async fn update_many(&self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError> {
        let result = self.collection(namespace).update_many(filter.to_document(), update.to_document()?).await?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count
        })
    }

    async fn delete_one(&self, namespace: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.collection(namespace).delete_one(filter.to_document()).await?.deleted_count)
    }

    async fn delete_many(&self, namespace: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        if filter.is_everything() {
            warn!("Deleting every document in [{namespace}]");
        }

        Ok(self.collection(namespace).delete_many(filter.to_document()).await?.deleted_count)
    }

    async fn aggregate(&self, namespace: &Namespace, pipeline: &Pipeline) -> Result<DocumentStream, StoreError> {
        let cursor = self.collection(namespace).aggregate(pipeline.to_documents()).await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        debug!("Started transaction on session {:?}", session.id());

        Ok(Box::new(MongoTransaction {
            client: self.client.clone(),
            session,
            phase: TransactionPhase::Open
        }))
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("Client shut down");
    }
}

/// A session with an open transaction. The driver aborts it if the session
/// is dropped before commit.
struct MongoTransaction {
    client: Client,
    session: ClientSession,
    phase: TransactionPhase
}

impl MongoTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        match self.phase {
            TransactionPhase::Open => Ok(()),
            _ => Err(StoreError::TransactionClosed)
        }
    }
}

#[async_trait]
impl StoreTransaction for MongoTransaction {
    async fn update_one(&mut self, namespace: &Namespace, filter: &Filter, update: &Update) -> Result<UpdateOutcome, StoreError> {
        self.ensure_open()?;

        let update = update.to_document()?;
        let result = collection(&self.client, namespace)
            .update_one(filter.to_document(), update)
            .session(&mut self.session)
            .await?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count
        })
    }

    async fn insert_one(&mut self, namespace: &Namespace, document: Document) -> Result<Bson, StoreError> {
        self.ensure_open()?;

        let (id, document) = ensure_id(document);

        collection(&self.client, namespace)
            .insert_one(document)
            .session(&mut self.session)
            .await
            .map_err(|error| insert_failed(namespace, id.clone(), error))?;

        Ok(id)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if self.phase == TransactionPhase::Aborted {
            return Err(StoreError::TransactionClosed);
        }

        self.session.commit_transaction().await?;
        self.phase = TransactionPhase::Committed;

        Ok(())
    }

    async fn abort(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;

        // The driver ends the transaction even when the abort request fails
        self.phase = TransactionPhase::Aborted;
        self.session.abort_transaction().await?;

        Ok(())
    }
}
