use std::time::Duration;

use thiserror::Error;

use crate::types::EndpointId;

/// Rejected endpoint configuration or malformed caller input.
///
/// Surfaced synchronously to the caller and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unknown event name `{0}`")]
    UnknownEvent(String),

    #[error("unknown template `{0}`")]
    UnknownTemplate(String),

    #[error("template `{0}` is already registered")]
    DuplicateTemplate(String),

    #[error("endpoint name must not be empty")]
    EmptyName,
}

/// Back-pressure signal: the live queue reached its configured capacity.
///
/// Propagated to the caller of `trigger_event` so upstream can decide to
/// drop, log, or block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery queue is full (capacity {capacity})")]
pub struct QueueFullError {
    pub capacity: usize,
}

/// One delivery attempt failed.
///
/// Whether the attempt is retried is encoded in the variant: client errors
/// are terminal, everything else goes back through the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("remote endpoint returned {status}")]
    RemoteError { status: u16 },

    #[error("client error {status} (non-retryable)")]
    ClientError { status: u16 },

    #[error("rate limit exhausted")]
    RateLimited { retry_after: Option<Duration> },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("endpoint no longer resolvable")]
    UnknownEndpoint,
}

impl DeliveryError {
    /// Client errors are never retried; everything else is.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::ClientError { .. })
    }

    /// Retry delay hint attached to the failure, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DeliveryError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Registry persistence failure.
///
/// Logged and never rolled back into the in-memory catalog: the live
/// catalog stays available even when saves fail.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Secret encryption/decryption failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("endpoint not found: {0}")]
    NotFound(EndpointId),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Errors returned by the typed trigger facade.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    QueueFull(#[from] QueueFullError),

    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}
