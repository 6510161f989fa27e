//! Stored web-app URL messenger
//!
//! Replays a hand-off URL that was captured outside this process (for
//! example copied from a desktop client's web-app inspector). No network
//! connection is involved; connect/disconnect only track the session window
//! so misuse shows up the same way it would with a live client.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::{Messenger, MessengerError, Result, WebViewRequest};

/// Messenger backed by a single recorded hand-off URL.
pub struct StoredWebApp {
    url: String,
    connected: AtomicBool,
}

impl StoredWebApp {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connected: AtomicBool::new(false),
        }
    }
}

impl Messenger for StoredWebApp {
    fn id(&self) -> &str {
        "stored"
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.url.is_empty() {
                return Err(MessengerError::Config("stored hand-off URL is empty".into()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn request_web_view<'a>(
        &'a self,
        request: &'a WebViewRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(MessengerError::Connect("not connected".into()));
            }
            debug!(bot = %request.bot, "replaying stored web view URL");
            Ok(self.url.clone())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.connected.store(false, Ordering::SeqCst);
        })
    }
}
