use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::config::ConfigError;
use crate::storage::Namespace;

pub const URI_VARIABLE: &str = "MONGODB_URI";
pub const LOG_VARIABLE: &str = "MONGO_TOUR_LOG";

const URI_SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// Upper bound the server puts on a transaction's lifetime before aborting it.
const TRANSACTION_LIFETIME: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    /// Wall-clock budget for the whole transfer, retries included.
    pub max_duration: Duration,
    /// Pause before restarting after a transient conflict.
    pub retry_backoff: Duration
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_duration: TRANSACTION_LIFETIME,
            retry_backoff: Duration::from_millis(50)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub uri: String,
    pub log_level: LevelFilter,
    /// CRUD and aggregation target.
    pub accounts: Namespace,
    pub bank_accounts: Namespace,
    pub transfers: Namespace,
    pub transfer_policy: TransferPolicy
}

impl Settings {
    /// Reads `.env` from the working directory if present, then the process environment.
    /// Variables already set in the environment win over `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(error) if error.not_found() => {}
            Err(error) => return Err(ConfigError::DotEnv(error))
        }

        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let uri = lookup(URI_VARIABLE)
            .map(|uri| uri.trim().to_string())
            .filter(|uri| !uri.is_empty())
            .ok_or(ConfigError::MissingUri)?;

        if !URI_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
            return Err(ConfigError::InvalidUri(uri));
        }

        let log_level = lookup(LOG_VARIABLE)
            .map(|level| parse_log_level(&level))
            .unwrap_or(LevelFilter::ERROR);

        Ok(Self {
            uri,
            log_level,
            accounts: Namespace::new("sample_analytics", "accounts"),
            bank_accounts: Namespace::new("bank", "accounts"),
            transfers: Namespace::new("bank", "transfers"),
            transfer_policy: TransferPolicy::default()
        })
    }
}

pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}
