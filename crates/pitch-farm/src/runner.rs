//! Per-account farming loop
//!
//! `Farmer` owns one account end to end: the initial login, the token
//! manager, the API client and the cached next-claim instant. It performs the
//! I/O for the current `FarmState` and feeds the outcome to
//! `farming::handle_transition`.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use messenger::Messenger;
use pitch_auth::API_BASE_URL;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::client::ApiClient;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::events::{Event, EventBus, EventKind};
use crate::farming::{FarmState, Transition, handle_transition};
use crate::handshake::{AuthHandshake, Handshake};
use crate::token::TokenManager;

/// Default pause between farming checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);

/// Tunables for one `Farmer`.
#[derive(Debug, Clone)]
pub struct FarmerOptions {
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Default for FarmerOptions {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct Farmer {
    account: String,
    client: ApiClient,
    handshake: Arc<dyn Handshake>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    state: FarmState,
    /// End of the current farming window in unix ms; 0 until first known
    next_claim_ms: i64,
}

impl Farmer {
    /// Farmer that logs in through `messenger` against the Pitch API.
    pub fn new(
        account: impl Into<String>,
        http: reqwest::Client,
        messenger: Arc<dyn Messenger>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        options: FarmerOptions,
    ) -> Self {
        let account = account.into();
        let handshake = Arc::new(AuthHandshake::new(
            account.clone(),
            messenger,
            http.clone(),
            options.base_url.clone(),
            events.clone(),
        ));
        Self::with_handshake(account, http, handshake, events, clock, options)
    }

    /// Farmer with a caller-supplied handshake.
    pub fn with_handshake(
        account: impl Into<String>,
        http: reqwest::Client,
        handshake: Arc<dyn Handshake>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        options: FarmerOptions,
    ) -> Self {
        let account = account.into();
        let tokens = Arc::new(TokenManager::new(account.clone(), clock.clone()));
        let client = ApiClient::new(http, options.base_url, tokens, handshake.clone());
        Self {
            account,
            client,
            handshake,
            events,
            clock,
            poll_interval: options.poll_interval,
            state: FarmState::Checking,
            next_claim_ms: 0,
        }
    }

    pub fn next_claim_ms(&self) -> i64 {
        self.next_claim_ms
    }

    /// Initial handshake; seeds the token manager.
    pub async fn login(&self) -> Result<()> {
        let session = self.handshake.authenticate().await?;
        info!(
            account = %self.account,
            coins = session.response.user.coins,
            tickets = session.response.user.tickets,
            "logged in"
        );
        self.client.tokens().install(&session).await
    }

    /// Log in, then step the state machine until `cancel` fires.
    ///
    /// Only the initial login can fail the run; every later error is logged
    /// and absorbed by the loop.
    #[instrument(skip_all, fields(account = %self.account))]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        tokio::select! {
            result = self.login() => result?,
            _ = cancel.cancelled() => {
                info!(account = %self.account, "cancelled before login completed");
                return Ok(());
            }
        }

        while self.step(&cancel).await != FarmState::Stopped {}
        info!(account = %self.account, "farming stopped");
        Ok(())
    }

    /// Execute the current state once and advance.
    pub async fn step(&mut self, cancel: &CancellationToken) -> FarmState {
        let transition = if cancel.is_cancelled() {
            Transition::Cancelled
        } else {
            match self.state {
                FarmState::Checking => {
                    self.check().await;
                    Transition::CheckFinished
                }
                FarmState::Claiming => {
                    self.claim().await;
                    Transition::ClaimFinished
                }
                FarmState::Waiting => {
                    tokio::select! {
                        _ = cancel.cancelled() => Transition::Cancelled,
                        _ = self.clock.sleep(self.poll_interval) => Transition::WaitElapsed,
                    }
                }
                FarmState::Stopped => return FarmState::Stopped,
            }
        };

        self.state = handle_transition(
            self.state,
            transition,
            self.clock.now_ms(),
            self.next_claim_ms,
        );
        self.state
    }

    async fn check(&mut self) {
        match self.client.check_farming().await {
            Ok(farming) => {
                self.set_next_claim(farming.next_claim_ms());
                metrics::counter!("farm_checks_total", "account" => self.account.clone(), "outcome" => "ok")
                    .increment(1);
                info!(
                    account = %self.account,
                    next_claim = %format_ms(self.next_claim_ms),
                    "farming window"
                );
                self.events
                    .publish(&Event::new(&self.account, EventKind::FarmCheck(farming)));
            }
            Err(e) => {
                let outcome = match e {
                    Error::NotModified => "not_modified",
                    _ => "error",
                };
                metrics::counter!("farm_checks_total", "account" => self.account.clone(), "outcome" => outcome)
                    .increment(1);
                warn!(account = %self.account, error = %e, kind = e.kind(), "farming check failed");
            }
        }
    }

    async fn claim(&mut self) {
        let result = self
            .client
            .claim_farming()
            .await
            .map_err(|e| Error::Claim(e.to_string()));
        match result {
            Ok(claimed) => {
                self.set_next_claim(claimed.farming.next_claim_ms());
                metrics::counter!("farm_claims_total", "account" => self.account.clone(), "outcome" => "ok")
                    .increment(1);
                info!(
                    account = %self.account,
                    coins = claimed.user.coins,
                    next_claim = %format_ms(self.next_claim_ms),
                    "farming claimed"
                );
                self.events
                    .publish(&Event::new(&self.account, EventKind::FarmClaim(claimed)));
            }
            Err(e) => {
                metrics::counter!("farm_claims_total", "account" => self.account.clone(), "outcome" => "failed")
                    .increment(1);
                error!(account = %self.account, error = %e, "farming claim failed");
            }
        }
    }

    fn set_next_claim(&mut self, next_claim_ms: i64) {
        self.next_claim_ms = next_claim_ms;
        metrics::gauge!("farm_next_claim_timestamp_seconds", "account" => self.account.clone())
            .set(next_claim_ms as f64 / 1000.0);
    }
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}
