//! In-process semantics for the operator subset the tour sends: comparison
//! filters, `$inc`/`$set`/`$push` updates and the typed pipeline stages.

use std::cmp::Ordering;

use bson::{Bson, Document};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::query::{Accumulator, Comparison, Condition, Filter, Projection, SortOrder, Stage, Pipeline, Update};
use crate::types::decimal128;

#[derive(Debug, Clone, Copy)]
enum Number {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal)
}

impl Number {
    fn from_bson(value: &Bson) -> Option<Number> {
        match value {
            Bson::Int32(value) => Some(Number::Int32(*value)),
            Bson::Int64(value) => Some(Number::Int64(*value)),
            Bson::Double(value) => Some(Number::Double(*value)),
            Bson::Decimal128(value) => decimal128::decode(value).ok().map(Number::Decimal),
            _ => None
        }
    }

    fn to_decimal(self) -> Option<Decimal> {
        match self {
            Number::Int32(value) => Some(Decimal::from(value)),
            Number::Int64(value) => Some(Decimal::from(value)),
            Number::Double(value) => Decimal::from_f64(value),
            Number::Decimal(value) => Some(value)
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Number::Int32(value) => value as f64,
            Number::Int64(value) => value as f64,
            Number::Double(value) => value,
            Number::Decimal(value) => value.to_f64().unwrap_or(f64::NAN)
        }
    }

    fn is_decimal(&self) -> bool {
        matches!(self, Number::Decimal(_))
    }

    /// Widens the same way the server does: decimal beats double beats long beats int.
    fn add(self, other: Number) -> Option<Bson> {
        match (self, other) {
            (Number::Int32(left), Number::Int32(right)) => Some(left.checked_add(right)
                .map(Bson::Int32)
                .unwrap_or_else(|| Bson::Int64(left as i64 + right as i64))),
            (left, right) if left.is_decimal() || right.is_decimal() => {
                left.to_decimal()?.checked_add(right.to_decimal()?)
                    .and_then(|total| decimal128::to_bson(total).ok())
            }
            (Number::Double(_), _) | (_, Number::Double(_)) => Some(Bson::Double(self.to_f64() + other.to_f64())),
            (left, right) => {
                let left = left.to_decimal()?.to_i64()?;
                let right = right.to_decimal()?.to_i64()?;
                left.checked_add(right).map(Bson::Int64)
            }
        }
    }
}

/// Orders two values when they are comparable: numbers across numeric types,
/// strings lexically, anything else only by equality.
pub fn compare(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (Number::from_bson(left), Number::from_bson(right)) {
        return match (left.to_decimal(), right.to_decimal()) {
            (Some(left), Some(right)) => Some(left.cmp(&right)),
            _ => left.to_f64().partial_cmp(&right.to_f64())
        };
    }

    match (left, right) {
        (Bson::String(left), Bson::String(right)) => Some(left.cmp(right)),
        (left, right) if left == right => Some(Ordering::Equal),
        _ => None
    }
}

pub fn matches(document: &Document, filter: &Filter) -> bool {
    filter.conditions().iter().all(|condition| satisfies(document, condition))
}

fn satisfies(document: &Document, condition: &Condition) -> bool {
    let value = document.get(&condition.field);

    match condition.comparison {
        Comparison::Eq => equals(value, &condition.value),
        Comparison::Lt => value.and_then(|value| compare(value, &condition.value)) == Some(Ordering::Less),
        Comparison::Gt => value.and_then(|value| compare(value, &condition.value)) == Some(Ordering::Greater)
    }
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        Some(value) => compare(value, expected) == Some(Ordering::Equal),
        None => *expected == Bson::Null
    }
}

/// Applies an update in place. Returns whether the document changed.
pub fn apply(document: &mut Document, update: &Update) -> Result<bool, String> {
    let before = document.clone();

    for (field, delta) in update.increments() {
        let current = document.get(field).cloned();

        let next = match current {
            None => delta.clone(),
            Some(current) => {
                let (Some(current), Some(delta)) = (Number::from_bson(&current), Number::from_bson(delta)) else {
                    return Err(format!("cannot apply $inc to non-numeric field [{field}]"));
                };

                current.add(delta).ok_or_else(|| format!("$inc overflowed field [{field}]"))?
            }
        };

        document.insert(field.clone(), next);
    }

    for (field, value) in update.sets() {
        document.insert(field.clone(), value.clone());
    }

    for (field, value) in update.pushes() {
        match document.get_mut(field) {
            Some(Bson::Array(items)) => items.push(value.clone()),
            Some(_) => return Err(format!("cannot apply $push to non-array field [{field}]")),
            None => {
                document.insert(field.clone(), Bson::Array(vec![value.clone()]));
            }
        }
    }

    Ok(*document != before)
}

pub fn run(documents: Vec<Document>, pipeline: &Pipeline) -> Vec<Document> {
    pipeline.stages().iter().fold(documents, |documents, stage| match stage {
        Stage::Match(filter) => documents.into_iter().filter(|document| matches(document, filter)).collect(),
        Stage::Group { key, accumulators } => group(documents, key, accumulators),
        Stage::Sort(keys) => sort(documents, keys),
        Stage::Project(fields) => documents.iter().map(|document| project(document, fields)).collect()
    })
}

fn group(documents: Vec<Document>, key: &str, accumulators: &[(String, Accumulator)]) -> Vec<Document> {
    let mut groups: Vec<(Bson, Vec<Document>)> = Vec::new();

    for document in documents {
        let value = document.get(key).cloned().unwrap_or(Bson::Null);

        match groups.iter_mut().find(|(existing, _)| *existing == value) {
            Some((_, members)) => members.push(document),
            None => groups.push((value, vec![document]))
        }
    }

    groups.into_iter().map(|(value, members)| {
        let mut output = Document::new();
        output.insert("_id", value);

        for (name, accumulator) in accumulators {
            output.insert(name.clone(), accumulate(&members, accumulator));
        }

        output
    }).collect()
}

fn accumulate(members: &[Document], accumulator: &Accumulator) -> Bson {
    match accumulator {
        Accumulator::Average(field) => {
            let numbers: Vec<Number> = members.iter()
                .filter_map(|member| member.get(field).and_then(Number::from_bson))
                .collect();

            if numbers.is_empty() {
                return Bson::Null;
            }

            if numbers.iter().any(Number::is_decimal) {
                let total = numbers.iter()
                    .try_fold(Decimal::ZERO, |total, number| total.checked_add(number.to_decimal()?));

                return total
                    .and_then(|total| total.checked_div(Decimal::from(numbers.len())))
                    .and_then(|average| decimal128::to_bson(average).ok())
                    .unwrap_or(Bson::Null);
            }

            Bson::Double(numbers.iter().map(|number| number.to_f64()).sum::<f64>() / numbers.len() as f64)
        }
    }
}

fn sort(mut documents: Vec<Document>, keys: &[(String, SortOrder)]) -> Vec<Document> {
    documents.sort_by(|left, right| {
        for (field, order) in keys {
            let ordering = match (left.get(field), right.get(field)) {
                (Some(left), Some(right)) => compare(left, right).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal
            };

            let ordering = match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse()
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });

    documents
}

fn project(document: &Document, fields: &[(String, Projection)]) -> Document {
    let mut output = Document::new();
    let id_excluded = fields.iter().any(|(field, projection)| field == "_id" && *projection == Projection::Exclude);

    if !id_excluded {
        if let Some(id) = document.get("_id") {
            output.insert("_id", id.clone());
        }
    }

    for (field, projection) in fields {
        match projection {
            Projection::Include => {
                if let Some(value) = document.get(field) {
                    output.insert(field.clone(), value.clone());
                }
            }
            Projection::Exclude => {}
            Projection::Divide { field: source, divisor } => {
                output.insert(field.clone(), divide(document.get(source), *divisor));
            }
        }
    }

    output
}

fn divide(value: Option<&Bson>, divisor: f64) -> Bson {
    let Some(number) = value.and_then(Number::from_bson) else {
        return Bson::Null;
    };

    if number.is_decimal() {
        return number.to_decimal()
            .zip(Decimal::from_f64(divisor))
            .and_then(|(value, divisor)| value.checked_div(divisor))
            .and_then(|quotient| decimal128::to_bson(quotient).ok())
            .unwrap_or(Bson::Null);
    }

    Bson::Double(number.to_f64() / divisor)
}
