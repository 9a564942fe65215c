use bson::{doc, Bson, Document};

use crate::query::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[cfg(test)]
    Ascending,
    Descending
}

impl SortOrder {
    fn direction(&self) -> i32 {
        match self {
            #[cfg(test)]
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Mean of a numeric field over the group; non-numeric values are ignored.
    Average(String)
}

impl Accumulator {
    fn to_bson(&self) -> Bson {
        match self {
            Accumulator::Average(field) => Bson::Document(doc! { "$avg": format!("${field}") })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include,
    Exclude,
    /// Computed field: the value of `field` divided by a constant.
    Divide { field: String, divisor: f64 }
}

impl Projection {
    fn to_bson(&self) -> Bson {
        match self {
            Projection::Include => Bson::Int32(1),
            Projection::Exclude => Bson::Int32(0),
            Projection::Divide { field, divisor } => {
                Bson::Document(doc! { "$divide": [format!("${field}"), *divisor] })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Group {
        /// Field whose value becomes the group's `_id`.
        key: String,
        accumulators: Vec<(String, Accumulator)>
    },
    Sort(Vec<(String, SortOrder)>),
    Project(Vec<(String, Projection)>)
}

impl Stage {
    pub fn to_document(&self) -> Document {
        match self {
            Stage::Match(filter) => doc! { "$match": filter.to_document() },
            Stage::Group { key, accumulators } => {
                let mut group = doc! { "_id": format!("${key}") };

                for (name, accumulator) in accumulators {
                    group.insert(name.clone(), accumulator.to_bson());
                }

                doc! { "$group": group }
            }
            Stage::Sort(keys) => {
                let mut sort = Document::new();

                for (field, order) in keys {
                    sort.insert(field.clone(), order.direction());
                }

                doc! { "$sort": sort }
            }
            Stage::Project(fields) => {
                let mut project = Document::new();

                for (field, projection) in fields {
                    project.insert(field.clone(), projection.to_bson());
                }

                doc! { "$project": project }
            }
        }
    }
}

/// Ordered list of aggregation stages, submitted as one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    #[cfg(test)]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// Accounts with `balance < threshold`, grouped by `account_type` with their mean balance.
    pub fn average_balance_below(threshold: i64) -> Pipeline {
        Pipeline::builder()
            .filter(Filter::lt("balance", threshold))
            .group("account_type", vec![("avg_balance", Accumulator::Average("balance".to_string()))])
            .build()
    }

    /// Checking accounts with `balance > threshold`, highest first, shaped to
    /// `account_type`, `balance` and `gbp_balance` without `_id`.
    pub fn checking_balances_in_gbp(threshold: i64, usd_per_gbp: f64) -> Pipeline {
        Pipeline::builder()
            .filter(Filter::eq("account_type", "checking").and(Filter::gt("balance", threshold)))
            .sort(vec![("balance", SortOrder::Descending)])
            .project(vec![
                ("account_type", Projection::Include),
                ("balance", Projection::Include),
                ("gbp_balance", Projection::Divide { field: "balance".to_string(), divisor: usd_per_gbp }),
                ("_id", Projection::Exclude)
            ])
    }
}

/// Builds a `Pipeline`. `project` fixes the output shape and therefore ends the pipeline.
pub struct PipelineBuilder {
    stages: Vec<Stage>
}

impl PipelineBuilder {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn group(mut self, key: &str, accumulators: Vec<(&str, Accumulator)>) -> Self {
        self.stages.push(Stage::Group {
            key: key.to_string(),
            accumulators: accumulators.into_iter().map(|(name, accumulator)| (name.to_string(), accumulator)).collect()
        });
        self
    }

    pub fn sort(mut self, keys: Vec<(&str, SortOrder)>) -> Self {
        self.stages.push(Stage::Sort(keys.into_iter().map(|(field, order)| (field.to_string(), order)).collect()));
        self
    }

    pub fn project(mut self, fields: Vec<(&str, Projection)>) -> Pipeline {
        self.stages.push(Stage::Project(fields.into_iter().map(|(field, projection)| (field.to_string(), projection)).collect()));
        self.build()
    }

    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages }
    }
}
