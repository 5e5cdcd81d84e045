use thiserror::Error;

/// Result type used across the relay core crate.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Canonical error representation shared by all services.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("queue store error: {0}")]
    QueueError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("Product {0} does not exist")]
    ProductNotFound(i32),

    #[error("Product {0} already exists")]
    ProductExists(i32),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    GeneralError(String),
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        RelayError::DatabaseError(err.to_string())
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(err: redis::RedisError) -> Self {
        RelayError::QueueError(err.to_string())
    }
}

/// Rejected configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl From<ConfigError> for RelayError {
    fn from(value: ConfigError) -> Self {
        RelayError::ConfigError(value.to_string())
    }
}
