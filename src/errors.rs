//! Discovery Engine Error Hierarchy
//!
//! Defines error types for the target-discovery subsystem, categorized by
//! the layer they originate from (client transport, discovery lifecycle,
//! configuration).

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading/validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Catalog client transport failures
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Discovery lifecycle failures (construction, teardown)
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Errors produced by a [`CatalogClient`](crate::CatalogClient)
/// implementation.
///
/// Steady-state instances of these are absorbed by the watcher loops
/// (logged, previous data retained); they only propagate to callers during
/// coordinator construction.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Catalog endpoint unavailable (connection refused, 5xx)
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// Request exceeded the client read timeout
    #[error("Request to {path} timed out after {duration:?}")]
    Timeout { path: String, duration: Duration },

    /// Malformed response body
    #[error("Cannot parse response from {path}: {reason}")]
    Decode { path: String, reason: String },

    /// Malformed catalog server address
    #[error("Invalid API server address: {0}")]
    InvalidAddress(String),

    /// Anything else the transport wants to surface
    #[error("Transport error: {source}")]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The synchronous first reconcile failed, so no coordinator was built.
    #[error("Cannot bootstrap service discovery for {api_server}: {source}")]
    Bootstrap {
        api_server: String,
        #[source]
        source: Box<Error>,
    },
}
