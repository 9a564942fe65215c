use std::io::Write;

use anyhow::Result;
use bson::Bson;
use futures::TryStreamExt;

use crate::config::Settings;
use crate::engine::{Reporter, TransferOrchestrator};
use crate::models::samples;
use crate::query::{Filter, Pipeline, Update};
use crate::storage::{DocumentStore, DocumentStream};

const LIMIT_CEILING: i64 = 3000;
const LIMIT_INCREMENT: i64 = 1000;
const MIN_LIMIT: i64 = 1000;
const AVERAGE_BALANCE_CEILING: i64 = 1000;
const GBP_BALANCE_FLOOR: i64 = 1500;
const USD_PER_GBP: f64 = 1.3;

/// The fixed walkthrough: CRUD on one collection, a transfer transaction and
/// two aggregations, reporting every result. Any failure ends the run.
///
/// Insert steps assume the sample documents are not already stored.
pub struct Tour<'a, W: Write> {
    store: &'a dyn DocumentStore,
    settings: &'a Settings,
    reporter: Reporter<W>
}

impl<'a, W: Write> Tour<'a, W> {
    pub fn new(store: &'a dyn DocumentStore, settings: &'a Settings, reporter: Reporter<W>) -> Self {
        Self {
            store,
            settings,
            reporter
        }
    }

    #[cfg(test)]
    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }

    pub async fn run(&mut self) -> Result<()> {
        self.list_databases().await?;

        let inserted_id = self.insert_documents().await?;

        self.query_documents().await?;
        self.update_documents(&inserted_id).await?;
        self.delete_documents(&inserted_id).await?;
        self.transfer_funds().await?;
        self.average_balances().await?;
        self.checking_balances_in_gbp().await?;

        self.reporter.flush()
    }

    async fn list_databases(&mut self) -> Result<()> {
        self.reporter.heading("Databases")?;

        for name in self.store.list_database_names().await? {
            self.reporter.line(name)?;
        }

        Ok(())
    }

    async fn insert_documents(&mut self) -> Result<Bson> {
        let accounts = &self.settings.accounts;
        self.reporter.heading("Insert documents")?;

        let inserted_id = self.store.insert_one(accounts, bson::to_document(&samples::new_account())?).await?;
        self.reporter.line(format!("_id of the inserted document is {inserted_id}"))?;

        let documents = samples::new_accounts().iter()
            .map(bson::to_document)
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self.store.insert_many(accounts, documents).await?;
        let listed: Vec<String> = ids.iter().map(Bson::to_string).collect();

        self.reporter.line(format!("Number of inserted ids: {}", ids.len()))?;
        self.reporter.line(format!("_ids of inserted documents: [{}]", listed.join(", ")))?;

        Ok(inserted_id)
    }

    async fn query_documents(&mut self) -> Result<()> {
        let accounts = &self.settings.accounts;
        self.reporter.heading("Query documents")?;

        let known = self.store.find_one(accounts, &Filter::by_id(samples::KNOWN_ACCOUNT_ID)).await?;
        self.reporter.optional_document(known.as_ref())?;

        let cursor = self.store.find(accounts, &Filter::lt("limit", LIMIT_CEILING)).await?;
        let total = self.print_all(cursor).await?;
        self.reporter.line(format!("Total of documents found: {total}"))?;

        Ok(())
    }

    async fn update_documents(&mut self, inserted_id: &Bson) -> Result<()> {
        let accounts = &self.settings.accounts;
        self.reporter.heading("Update documents")?;

        let by_id = Filter::by_id(inserted_id.clone());
        let before = self.store.find_one(accounts, &by_id).await?;
        self.reporter.optional_document(before.as_ref())?;

        let outcome = self.store.update_one(accounts, &by_id, &Update::new().increment("limit", LIMIT_INCREMENT)).await?;
        self.reporter.line(format!("Updated documents: {}", outcome.modified_count))?;

        let after = self.store.find_one(accounts, &by_id).await?;
        self.reporter.optional_document(after.as_ref())?;

        let below_ceiling = Filter::lt("limit", LIMIT_CEILING);
        let outcome = self.store.update_many(accounts, &below_ceiling, &Update::new().set("min_limit", MIN_LIMIT)).await?;
        self.reporter.line(format!("Documents matched: {}", outcome.matched_count))?;
        self.reporter.line(format!("Documents updated: {}", outcome.modified_count))?;

        self.reporter.line("Sample updated document")?;
        let sample = self.store.find_one(accounts, &below_ceiling).await?;
        self.reporter.optional_document(sample.as_ref())?;

        self.reporter.line("All updated documents")?;
        let cursor = self.store.find(accounts, &below_ceiling).await?;
        self.print_all(cursor).await?;

        Ok(())
    }

    async fn delete_documents(&mut self, inserted_id: &Bson) -> Result<()> {
        let accounts = &self.settings.accounts;
        self.reporter.heading("Delete documents")?;

        let by_id = Filter::by_id(inserted_id.clone());
        self.reporter.line("Searching for target document before delete:")?;
        let before = self.store.find_one(accounts, &by_id).await?;
        self.reporter.optional_document(before.as_ref())?;

        let deleted = self.store.delete_one(accounts, &by_id).await?;

        self.reporter.line("Searching for target document after delete:")?;
        let after = self.store.find_one(accounts, &by_id).await?;
        self.reporter.optional_document(after.as_ref())?;
        self.reporter.line(format!("Documents deleted: {deleted}"))?;

        let below_ceiling = Filter::lt("limit", LIMIT_CEILING);
        self.reporter.line("Sample target document before delete:")?;
        let before = self.store.find_one(accounts, &below_ceiling).await?;
        self.reporter.optional_document(before.as_ref())?;

        let deleted = self.store.delete_many(accounts, &below_ceiling).await?;

        self.reporter.line("Sample target document after delete:")?;
        let after = self.store.find_one(accounts, &below_ceiling).await?;
        self.reporter.optional_document(after.as_ref())?;
        self.reporter.line(format!("Documents deleted: {deleted}"))?;

        Ok(())
    }

    async fn transfer_funds(&mut self) -> Result<()> {
        self.reporter.heading("Transaction")?;

        let orchestrator = TransferOrchestrator::new(
            self.settings.bank_accounts.clone(),
            self.settings.transfers.clone(),
            self.settings.transfer_policy
        );

        let receipt = orchestrator.execute(self.store, &samples::transfer()).await?;

        self.reporter.line(format!(
            "Transaction successful: transfer [{}] committed after {} attempt(s)",
            receipt.transfer_id, receipt.attempts
        ))?;

        self.reporter.line("Accounts after the transfer:")?;
        let cursor = self.store.find(&self.settings.bank_accounts, &Filter::everything()).await?;
        self.print_all(cursor).await?;

        Ok(())
    }

    async fn average_balances(&mut self) -> Result<()> {
        self.reporter.heading("Aggregation: match and group")?;
        self.reporter.line(format!(
            "Average balance of checking and savings accounts with balances of less than ${AVERAGE_BALANCE_CEILING}:"
        ))?;

        let cursor = self.store.aggregate(&self.settings.accounts, &Pipeline::average_balance_below(AVERAGE_BALANCE_CEILING)).await?;
        self.print_all(cursor).await?;

        Ok(())
    }

    async fn checking_balances_in_gbp(&mut self) -> Result<()> {
        self.reporter.heading("Aggregation: sort and project")?;
        self.reporter.line(format!(
            "Account type, balance and GBP balance of checking accounts above ${GBP_BALANCE_FLOOR}, highest balance first:"
        ))?;

        let pipeline = Pipeline::checking_balances_in_gbp(GBP_BALANCE_FLOOR, USD_PER_GBP);
        let cursor = self.store.aggregate(&self.settings.accounts, &pipeline).await?;
        self.print_all(cursor).await?;

        Ok(())
    }

    async fn print_all(&mut self, mut cursor: DocumentStream) -> Result<usize> {
        let mut total = 0;

        while let Some(document) = cursor.try_next().await? {
            total += 1;
            self.reporter.document(&document)?;
        }

        Ok(total)
    }
}
