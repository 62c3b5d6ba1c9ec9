//! Error types for the request-counting service.
//!
//! This module defines the central `Error` enum, which captures the
//! startup-fatal and internal error cases of the server. Everything else
//! (a missing counter backup, a failed log write, a client that went away
//! mid-response) is absorbed where it happens and logged, never propagated.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the request-counting service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listening socket could not be bound. The only startup-fatal case.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Internal channel send/receive failure (e.g., a closed channel).
    #[error("channel error: {context}")]
    Channel { context: String },

    /// The supplied configuration cannot produce a working server.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The service is in the process of shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
