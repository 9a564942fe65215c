mod errors;
mod filter;
mod pipeline;
mod update;

pub use errors::QueryError;
pub use filter::Filter;
#[cfg(test)]
pub use filter::{Comparison, Condition};
pub use pipeline::Pipeline;
#[cfg(test)]
pub use pipeline::{Accumulator, Projection, SortOrder, Stage};
pub use update::Update;
