use bson::{Bson, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Gt
}

impl Comparison {
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Eq => "$eq",
            Comparison::Lt => "$lt",
            Comparison::Gt => "$gt"
        }
    }
}

/// A single `field <op> value` predicate on a top level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparison: Comparison,
    pub value: Bson
}

impl Condition {
    fn to_document(&self) -> Document {
        let mut document = Document::new();

        match self.comparison {
            Comparison::Eq => {
                document.insert(self.field.clone(), self.value.clone());
            }
            comparison => {
                let mut operators = Document::new();
                operators.insert(comparison.operator(), self.value.clone());
                document.insert(self.field.clone(), operators);
            }
        }

        document
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Scope {
    Everything,
    Only(Vec<Condition>)
}

/// Document selection for reads, updates and deletes.
///
/// An empty filter matches every document in a collection, which turns
/// `delete_one` into "delete an arbitrary document" and `delete_many` into
/// "empty the collection". The only way to build one is `Filter::everything()`;
/// every other constructor carries at least one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Scope);

impl Filter {
    pub fn everything() -> Self {
        Filter(Scope::Everything)
    }

    pub fn by_id(id: impl Into<Bson>) -> Self {
        Filter::eq("_id", id)
    }

    pub fn condition(field: &str, comparison: Comparison, value: impl Into<Bson>) -> Self {
        Filter(Scope::Only(vec![Condition {
            field: field.to_string(),
            comparison,
            value: value.into()
        }]))
    }

    pub fn eq(field: &str, value: impl Into<Bson>) -> Self {
        Filter::condition(field, Comparison::Eq, value)
    }

    pub fn lt(field: &str, value: impl Into<Bson>) -> Self {
        Filter::condition(field, Comparison::Lt, value)
    }

    pub fn gt(field: &str, value: impl Into<Bson>) -> Self {
        Filter::condition(field, Comparison::Gt, value)
    }

    /// Conjunction. `everything()` is the identity.
    pub fn and(self, other: Filter) -> Self {
        match (self.0, other.0) {
            (Scope::Everything, scope) | (scope, Scope::Everything) => Filter(scope),
            (Scope::Only(mut left), Scope::Only(right)) => {
                left.extend(right);
                Filter(Scope::Only(left))
            }
        }
    }

    pub fn is_everything(&self) -> bool {
        matches!(self.0, Scope::Everything)
    }

    pub fn conditions(&self) -> &[Condition] {
        match &self.0 {
            Scope::Everything => &[],
            Scope::Only(conditions) => conditions
        }
    }

    /// Renders the filter document. A lone equality on a field uses the short
    /// `{ field: value }` form; anything else uses operator documents. When the
    /// same operator appears twice on one field the conditions cannot share a
    /// key, so the whole filter becomes `{ $and: [...] }` with one entry each.
    pub fn to_document(&self) -> Document {
        let conditions = self.conditions();

        let clashes = conditions.iter().enumerate().any(|(index, condition)| {
            conditions[index + 1..].iter()
                .any(|other| other.field == condition.field && other.comparison == condition.comparison)
        });

        if clashes {
            let clauses: Vec<Bson> = conditions.iter().map(|condition| Bson::Document(condition.to_document())).collect();

            let mut document = Document::new();
            document.insert("$and", clauses);
            return document;
        }

        let mut document = Document::new();

        for condition in conditions {
            let repeated = conditions.iter().filter(|other| other.field == condition.field).count() > 1;

            if condition.comparison == Comparison::Eq && !repeated {
                document.insert(condition.field.clone(), condition.value.clone());
                continue;
            }

            match document.get_mut(&condition.field) {
                Some(Bson::Document(operators)) => {
                    operators.insert(condition.comparison.operator(), condition.value.clone());
                }
                _ => {
                    let mut operators = Document::new();
                    operators.insert(condition.comparison.operator(), condition.value.clone());
                    document.insert(condition.field.clone(), operators);
                }
            }
        }

        document
    }
}
