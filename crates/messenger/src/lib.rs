//! Messaging-platform capability used to obtain web-app hand-off URLs
//!
//! Defines the `Messenger` trait that decouples the session engine from how
//! an account's Telegram session is driven. The engine only needs one
//! operation, wrapped in an explicit connect/disconnect pair so the
//! connection never outlives a handshake:
//!
//! 1. `connect()` acquires the platform connection
//! 2. `request_web_view()` asks the platform for a bot web-app URL whose
//!    fragment carries the signed init data
//! 3. `disconnect()` releases the connection, whether or not step 2 succeeded
//!
//! Two implementations ship with the crate: `StoredWebApp` replays a hand-off
//! URL captured out of band, and `CommandMessenger` delegates to an external
//! helper program that speaks the platform protocol.

pub mod command;
pub mod stored;

pub use command::CommandMessenger;
pub use stored::StoredWebApp;

use std::future::Future;
use std::pin::Pin;

/// Parameters of a bot web-view request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebViewRequest {
    /// Username of the bot that owns the web app (without `@`)
    pub bot: String,
    /// Origin URL of the web app
    pub url: String,
    /// Client platform reported to the messaging platform
    pub platform: String,
}

/// Errors from messenger operations.
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("messenger connection failed: {0}")]
    Connect(String),

    #[error("web view request failed: {0}")]
    Request(String),

    #[error("messenger misconfigured: {0}")]
    Config(String),
}

/// Result alias for messenger operations.
pub type Result<T> = std::result::Result<T, MessengerError>;

/// Abstraction over a logged-in messaging-platform session.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Messenger>`).
pub trait Messenger: Send + Sync {
    /// Identifier for logging (e.g. "stored", "command")
    fn id(&self) -> &str;

    /// Acquire the platform connection.
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Request a web-view URL for the given bot. Requires a prior `connect()`.
    fn request_web_view<'a>(
        &'a self,
        request: &'a WebViewRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    /// Release the platform connection. Never fails; implementations log
    /// teardown problems instead.
    fn disconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
