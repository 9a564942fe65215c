use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: MONGODB_URI is not set (export it or add it to .env)")]
    MissingUri,
    #[error("Configuration error: MONGODB_URI must start with mongodb:// or mongodb+srv://, got [{0}]")]
    InvalidUri(String),
    #[error("Configuration error: could not load .env: {0}")]
    DotEnv(#[from] dotenvy::Error)
}
