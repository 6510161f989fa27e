//! Typed publish/subscribe for account lifecycle events
//!
//! Observers (console logger, chat notifier) register on an `EventBusBuilder`
//! before the engine starts; the built `EventBus` is immutable and shared via
//! `Arc`. Delivery is synchronous and in registration order. A subscriber
//! that returns an error or panics is logged and skipped; it never reaches
//! the publisher or the other subscribers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use pitch_auth::{AuthResponse, ClaimResponse, DailyRewards, Farming, PitchUser};
use tracing::{debug, error, warn};

/// One engine event, labelled with the account it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub account: String,
    pub kind: EventKind,
}

/// Event payloads, one variant per event type.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Handshake completed; carries the full auth response
    Login(AuthResponse),
    /// First login of a calendar day
    DailyReward {
        user: PitchUser,
        rewards: DailyRewards,
    },
    /// Farming window read
    FarmCheck(Farming),
    /// Reward claimed; carries the updated user and the new window
    FarmClaim(ClaimResponse),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Login(_) => "login",
            EventKind::DailyReward { .. } => "daily_reward",
            EventKind::FarmCheck(_) => "farm_check",
            EventKind::FarmClaim(_) => "farm_claim",
        }
    }
}

impl Event {
    pub fn new(account: impl Into<String>, kind: EventKind) -> Self {
        Self {
            account: account.into(),
            kind,
        }
    }
}

/// Failure reported by a subscriber.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

/// An observer of engine events.
///
/// `on_event` runs on the publishing task, so implementations must not block;
/// hand slow work (network delivery) off to a channel.
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, event: &Event) -> Result<(), SubscriberError>;
}

/// Collects subscribers before the engine starts.
#[derive(Default)]
pub struct EventBusBuilder {
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventBusBuilder {
    pub fn subscribe(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn build(self) -> EventBus {
        EventBus {
            subscribers: self.subscribers,
        }
    }
}

/// Immutable fan-out of events to registered subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every subscriber. Returns how many failed.
    pub fn publish(&self, event: &Event) -> usize {
        let mut failed = 0;
        for subscriber in &self.subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(
                        account = %event.account,
                        event = event.kind.name(),
                        subscriber = subscriber.name(),
                        error = %e,
                        "subscriber failed"
                    );
                }
                Err(_) => {
                    failed += 1;
                    error!(
                        account = %event.account,
                        event = event.kind.name(),
                        subscriber = subscriber.name(),
                        "subscriber panicked"
                    );
                }
            }
        }
        debug!(
            account = %event.account,
            event = event.kind.name(),
            subscribers = self.subscribers.len(),
            failed,
            "event published"
        );
        failed
    }
}
