use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid topic filter: {0}")]
    InvalidTopicFilter(String),

    #[error("Broker error: {0}")]
    BrokerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Failure queue error: {0}")]
    QueueError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
