use bson::{Bson, Document};

use crate::query::QueryError;

/// Field-level modification: `$inc`, `$set` and `$push` only.
///
/// There is no replacement form, so an update can never overwrite a whole document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    increments: Document,
    sets: Document,
    pushes: Document
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(mut self, field: &str, by: impl Into<Bson>) -> Self {
        self.increments.insert(field, by.into());
        self
    }

    pub fn set(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.sets.insert(field, value.into());
        self
    }

    pub fn push(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.pushes.insert(field, value.into());
        self
    }

    #[cfg(test)]
    pub fn increments(&self) -> &Document {
        &self.increments
    }

    #[cfg(test)]
    pub fn sets(&self) -> &Document {
        &self.sets
    }

    #[cfg(test)]
    pub fn pushes(&self) -> &Document {
        &self.pushes
    }

    pub fn is_empty(&self) -> bool {
        self.increments.is_empty() && self.sets.is_empty() && self.pushes.is_empty()
    }

    pub fn to_document(&self) -> Result<Document, QueryError> {
        if self.is_empty() {
            return Err(QueryError::EmptyUpdate);
        }

        let mut document = Document::new();

        for (operator, fields) in [("$inc", &self.increments), ("$set", &self.sets), ("$push", &self.pushes)] {
            if !fields.is_empty() {
                document.insert(operator, fields.clone());
            }
        }

        Ok(document)
    }
}
