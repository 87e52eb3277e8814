use thiserror::Error;

/// A payload that cannot be decoded. Never retried: a malformed record will
/// not become parseable on a second attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("malformed payload {payload:?}: {reason}")]
    MalformedPayload { payload: String, reason: String },
}

/// Errors surfaced by a state store implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Transient unavailability; the caller must retry with backoff rather
    /// than advance past the update.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    #[error("state serialization failed: {0}")]
    Serialization(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("publish to bus failed: {reason}")]
pub struct PublishError {
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    #[error("no readings aggregated for station {station:?}")]
    EmptyAggregate { station: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] anyhow::Error),

    // Decode failures never escalate this far: the driver drops malformed
    // records at ingest.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("projection error: {0}")]
    Project(#[from] ProjectError),

    #[error("shard worker stopped unexpectedly")]
    ShardStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
