//! Error types for unsplash-dl
//!
//! This module provides the error taxonomy for the library:
//! - Fetch errors on the listing endpoints (abort the session, progress kept)
//! - Per-photo asset transfer and metadata errors (logged, never fatal)
//! - Persistence errors (logged, in-memory state keeps going)
//!
//! Running out of credentials is not an error: it ends the session with a
//! resumable [`SessionOutcome`](crate::types::SessionOutcome). An upstream 403
//! switches credentials and never surfaces here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for unsplash-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for unsplash-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Listing endpoint failed with something other than a rate limit
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transferring the bytes of a single photo failed
    #[error("asset transfer failed for photo {photo_id}: {reason}")]
    AssetTransfer {
        /// The photo whose asset could not be transferred
        photo_id: String,
        /// The reason the transfer failed
        reason: String,
    },

    /// Metadata writer could not annotate a downloaded file
    #[error("metadata write failed for {path}: {reason}")]
    Metadata {
        /// The file that was being annotated
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Saving a state snapshot failed
    #[error("failed to persist {path}: {source}")]
    Persistence {
        /// The snapshot file that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Operation observed a cancellation request
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from the authorized JSON endpoints (user info, photo listing)
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status other than 403
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The requested URL (without credentials)
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Upstream answered successfully but the body was not what we expected
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse {
        /// The requested URL (without credentials)
        url: String,
        /// What was wrong with the body
        reason: String,
    },
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, handy for event payloads and logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Fetch(FetchError::Status { .. }) => "fetch_status",
            Error::Fetch(FetchError::InvalidResponse { .. }) => "fetch_invalid_response",
            Error::AssetTransfer { .. } => "asset_transfer_error",
            Error::Metadata { .. } => "metadata_error",
            Error::Persistence { .. } => "persistence_error",
            Error::Cancelled => "cancelled",
        }
    }
}
