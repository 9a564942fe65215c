use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use bson::{Bson, Document};
use serde_json::{Map, Value};

/// Human-readable progress output. Not a stable format.
pub struct Reporter<W: Write> {
    output: W
}

impl<W: Write> Reporter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn heading(&mut self, title: &str) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "== {title} ==")?;
        Ok(())
    }

    pub fn line(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.output, "{text}")?;
        Ok(())
    }

    /// Pretty-printed extended JSON, with decimals shown as their digits.
    pub fn document(&mut self, document: &Document) -> Result<()> {
        let value = readable(&Bson::Document(document.clone()));
        serde_json::to_writer_pretty(&mut self.output, &value)?;
        writeln!(self.output)?;
        Ok(())
    }

    pub fn optional_document(&mut self, document: Option<&Document>) -> Result<()> {
        match document {
            Some(document) => self.document(document),
            None => self.line("No matching document")
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.output
    }
}

fn readable(value: &Bson) -> Value {
    match value {
        Bson::Decimal128(decimal) => {
            let mut wrapper = Map::new();
            wrapper.insert("$numberDecimal".to_string(), Value::String(decimal.to_string()));
            Value::Object(wrapper)
        }
        Bson::Document(document) => Value::Object(
            document.iter().map(|(key, value)| (key.clone(), readable(value))).collect()
        ),
        Bson::Array(items) => Value::Array(items.iter().map(readable).collect()),
        other => other.clone().into_relaxed_extjson()
    }
}
