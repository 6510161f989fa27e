//! Per-account farming session engine
//!
//! Drives one Pitch account: logs in through a messenger hand-off, keeps the
//! bearer token fresh, and polls/claims the farming reward forever. Each
//! account gets its own `Farmer`; nothing mutable is shared between them.
//!
//! Account lifecycle:
//! 1. `handshake::AuthHandshake` turns a messenger web-view URL into a token
//! 2. `token::TokenManager` holds the token and refreshes it when stale,
//!    rejecting requests with `TokenBusy` while a refresh is in flight
//! 3. `client::ApiClient` attaches credentials to every API call
//! 4. `runner::Farmer` steps the `farming` state machine
//!    (Checking → Waiting ⇄ Claiming) until cancelled
//! 5. Every transition is published on the `events::EventBus`

pub mod client;
pub mod clock;
pub mod error;
pub mod events;
pub mod farming;
pub mod handshake;
pub mod runner;
pub mod token;

pub use client::ApiClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventBusBuilder, EventKind, Subscriber, SubscriberError};
pub use farming::{FarmState, Transition, claim_due, handle_transition};
pub use handshake::{AuthHandshake, Handshake, Session};
pub use runner::{Farmer, FarmerOptions};
pub use token::TokenManager;

#[cfg(test)]
pub(crate) mod testing;
