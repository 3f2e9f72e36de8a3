//! Error types for burrow.

use std::io;

/// Errors produced by the burrow session engine.
#[derive(Debug, thiserror::Error)]
pub enum BurrowError {
    #[error("DNS error: {0}")]
    Dns(String),

    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    #[error("connection reset by {0}")]
    ConnectionReset(String),

    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("unsupported text encoding")]
    Decode,

    #[error("malformed menu line: {0:?}")]
    MalformedLine(String),

    #[error("error message from server: {0}")]
    ServerReported(String),

    #[error("handler program not found: {0}")]
    HandlerNotFound(String),

    #[error("local file error for {path}: {source}")]
    LocalFile {
        path: String,
        source: io::Error,
    },

    #[error("bad URL: {0}")]
    Url(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BurrowError {
    /// Whether this error is a network transport failure, i.e. one that
    /// the navigation engine may answer with a mirror failover attempt.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BurrowError::Dns(_)
                | BurrowError::ConnectionRefused(_)
                | BurrowError::ConnectionReset(_)
                | BurrowError::Timeout(_)
                | BurrowError::Tls(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BurrowError>;
