use thiserror::Error;

/// Failure reported by the broker collaborator itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("stream closed: {0}")]
    Closed(String),
}

/// Errors surfaced to the orchestrator. None of these are retried internally.
#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("{0} environment variable must be set")]
    ConfigMissing(&'static str),

    #[error("failed to list {scope}: {source}")]
    ListingFailed {
        scope: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to publish to {topic}: {source}")]
    PublishFailed {
        topic: String,
        #[source]
        source: TransportError,
    },

    #[error("receive on {subscription} failed after {received} messages: {source}")]
    ReceiveFailed {
        subscription: String,
        received: u64,
        #[source]
        source: TransportError,
    },
}

pub type Result<T, E = PubSubError> = std::result::Result<T, E>;
