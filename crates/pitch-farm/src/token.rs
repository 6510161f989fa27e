//! Bearer token lifecycle
//!
//! `TokenManager` owns one account's token state and its refresh lock.
//! A fresh token never touches the lock. Only a stale token takes it, with
//! `try_lock`, and re-checks staleness once it holds it. A caller that finds
//! a refresh in flight fails fast with `Error::TokenBusy` instead of queueing
//! or proceeding with a stale token. The in-flight flag and the guard are
//! both released on drop, on success and failure alike.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::Secret;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::handshake::{Handshake, Session};

/// Token, expiry and hand-off material for one account.
///
/// `expires_at_ms == 0` means no token has been installed yet.
#[derive(Debug, Default)]
pub struct TokenState {
    access_token: Option<Secret<String>>,
    expires_at_ms: i64,
    hand_off: Option<Secret<String>>,
}

impl TokenState {
    fn is_stale(&self, now_ms: i64) -> bool {
        self.expires_at_ms > 0 && now_ms > self.expires_at_ms
    }
}

/// Credentials to attach to one outgoing request.
#[derive(Debug, Clone)]
pub struct RequestCredentials {
    pub access_token: Option<String>,
    pub hand_off: Option<String>,
}

/// Per-account token owner with a single-flight refresh lock.
pub struct TokenManager {
    account: String,
    clock: Arc<dyn Clock>,
    state: RwLock<TokenState>,
    refresh_lock: Mutex<()>,
    refreshing: AtomicBool,
}

/// Raises the in-flight flag for the lifetime of a refresh.
struct RefreshFlag<'a>(&'a AtomicBool);

impl<'a> RefreshFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TokenManager {
    pub fn new(account: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            account: account.into(),
            clock,
            state: RwLock::new(TokenState::default()),
            refresh_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Install the result of a handshake performed outside `ensure_fresh`
    /// (the initial login).
    ///
    /// Goes through the refresh lock so a seed never interleaves with a refresh.
    pub async fn install(&self, session: &Session) -> Result<()> {
        let _guard = self.refresh_lock.try_lock().map_err(|_| Error::TokenBusy)?;
        self.store(session).await;
        Ok(())
    }

    /// Refresh the token if it has expired.
    ///
    /// - refresh in flight → `Error::TokenBusy`
    /// - no token yet, or token still valid → no-op
    /// - expired → run `handshake` under the lock and install the result
    pub async fn ensure_fresh(&self, handshake: &dyn Handshake) -> Result<()> {
        if self.refreshing.load(Ordering::SeqCst) {
            debug!(account = %self.account, "refresh in flight, rejecting request");
            return Err(Error::TokenBusy);
        }
        if !self.is_stale().await {
            return Ok(());
        }

        let _guard = self.refresh_lock.try_lock().map_err(|_| {
            debug!(account = %self.account, "refresh in flight, rejecting request");
            Error::TokenBusy
        })?;
        let _flag = RefreshFlag::raise(&self.refreshing);

        // another caller may have refreshed between the check and the lock
        if !self.is_stale().await {
            return Ok(());
        }

        info!(account = %self.account, "access token expired, refreshing");
        match handshake.authenticate().await {
            Ok(session) => {
                self.store(&session).await;
                metrics::counter!("farm_token_refresh_total", "account" => self.account.clone(), "outcome" => "success")
                    .increment(1);
                Ok(())
            }
            Err(e) => {
                warn!(account = %self.account, error = %e, "token refresh failed");
                metrics::counter!("farm_token_refresh_total", "account" => self.account.clone(), "outcome" => "failure")
                    .increment(1);
                Err(e)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) async fn expires_at_ms(&self) -> i64 {
        self.state.read().await.expires_at_ms
    }

    async fn is_stale(&self) -> bool {
        self.state.read().await.is_stale(self.clock.now_ms())
    }

    /// Current credentials for request headers.
    pub async fn credentials(&self) -> RequestCredentials {
        let state = self.state.read().await;
        RequestCredentials {
            access_token: state.access_token.as_ref().map(|t| t.expose().clone()),
            hand_off: state.hand_off.as_ref().map(|h| h.expose().clone()),
        }
    }

    async fn store(&self, session: &Session) {
        let mut state = self.state.write().await;
        state.access_token = Some(Secret::new(session.access_token.clone()));
        state.expires_at_ms = session.expires_at_ms;
        state.hand_off = Some(Secret::new(session.hand_off.clone()));
        debug!(
            account = %self.account,
            expires_at_ms = session.expires_at_ms,
            "installed access token"
        );
    }
}
