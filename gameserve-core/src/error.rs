//! Error types for gameserve

use thiserror::Error;

/// Result type for gameserve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gameserve
#[derive(Error, Debug)]
pub enum Error {
    /// The listen address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The client sent something that is not a usable HTTP request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
