//! Error types for the session engine

/// Errors from the session engine.
///
/// `TokenBusy`, `NotModified` and `Claim` are transient: the farming loop
/// logs them and carries on at the next tick. `Handshake` and friends are
/// fatal to the login attempt that produced them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("request canceled because token is currently being refreshed")]
    TokenBusy,

    #[error("farming status: 304 not modified")]
    NotModified,

    #[error("farm claim failed: {0}")]
    Claim(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("access token undecodable: {0}")]
    TokenDecode(String),

    #[error("messenger error: {0}")]
    Messenger(String),
}

impl From<pitch_auth::Error> for Error {
    fn from(err: pitch_auth::Error) -> Self {
        match err {
            pitch_auth::Error::Http(msg) => Error::Http(msg),
            pitch_auth::Error::TokenDecode(msg) => Error::TokenDecode(msg),
            other => Error::Handshake(other.to_string()),
        }
    }
}

impl From<messenger::MessengerError> for Error {
    fn from(err: messenger::MessengerError) -> Self {
        Error::Messenger(err.to_string())
    }
}

impl Error {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Handshake(_) => "handshake",
            Error::TokenBusy => "token_busy",
            Error::NotModified => "not_modified",
            Error::Claim(_) => "claim",
            Error::Http(_) => "http",
            Error::TokenDecode(_) => "token_decode",
            Error::Messenger(_) => "messenger",
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
