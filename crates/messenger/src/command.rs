//! External helper messenger
//!
//! Delegates the web-view request to a helper program that owns the real
//! messaging-platform session (for example a small MTProto script). The
//! helper is started once per request and must print the web-view URL on
//! stdout and exit 0. Arguments may contain placeholders:
//!
//! - `{phone}`: account identity
//! - `{bot}`: bot username
//! - `{url}`: web-app origin URL
//! - `{platform}`: client platform

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Messenger, MessengerError, Result, WebViewRequest};

/// Messenger that shells out to a helper program per web-view request.
pub struct CommandMessenger {
    phone: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
    connected: AtomicBool,
}

impl CommandMessenger {
    pub fn new(
        phone: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            phone: phone.into(),
            program: program.into(),
            args,
            timeout,
            connected: AtomicBool::new(false),
        }
    }

    /// Substitute placeholders in the configured argument list.
    fn render_args(&self, request: &WebViewRequest) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{phone}", &self.phone)
                    .replace("{bot}", &request.bot)
                    .replace("{url}", &request.url)
                    .replace("{platform}", &request.platform)
            })
            .collect()
    }

    async fn run_helper(&self, request: &WebViewRequest) -> Result<String> {
        let args = self.render_args(request);
        debug!(program = %self.program, args = ?args, "running web view helper");

        let child = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                MessengerError::Request(format!(
                    "helper {} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| MessengerError::Request(format!("spawning {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MessengerError::Request(format!(
                "helper {} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .ok_or_else(|| {
                MessengerError::Request(format!("helper {} printed no URL", self.program))
            })?;

        Ok(url.to_string())
    }
}

impl Messenger for CommandMessenger {
    fn id(&self) -> &str {
        "command"
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.program.trim().is_empty() {
                return Err(MessengerError::Config("helper program is empty".into()));
            }
            if self.connected.swap(true, Ordering::SeqCst) {
                warn!(phone = %self.phone, "helper session was already open");
            }
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
            self.run_helper(request).await
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.connected.store(false, Ordering::SeqCst);
        })
    }
}
