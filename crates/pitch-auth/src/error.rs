//! Error types for Pitch authentication operations

/// Errors from hand-off parsing, auth exchange and session storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("hand-off payload invalid: {0}")]
    Handshake(String),

    #[error("access token undecodable: {0}")]
    TokenDecode(String),

    #[error("session file parse error: {0}")]
    SessionParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid account identity: {0}")]
    InvalidAccount(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
