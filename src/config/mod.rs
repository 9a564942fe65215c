mod errors;
mod settings;

pub use errors::ConfigError;
pub use settings::{Settings, TransferPolicy};
#[cfg(test)]
pub use settings::parse_log_level;
