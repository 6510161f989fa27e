//! Pitch web API authentication library
//!
//! Provides hand-off payload parsing, the `/v1/api/auth` exchange, bearer
//! token expiry decoding, wire models and the per-account session store.
//! This crate knows nothing about scheduling or refresh policy; the session
//! engine in `pitch-farm` drives it.
//!
//! Login flow:
//! 1. A `messenger::Messenger` produces a web-app URL for `PITCH_BOT_ID`
//! 2. `handoff::parse_web_view_url()` extracts the init data and user descriptor
//! 3. `token::exchange_hand_off()` trades it for an access token
//! 4. `token::decode_expiry_ms()` reads the token's `exp` claim
//! 5. Accounts and their hand-off sources live in `sessions::SessionStore`

pub mod constants;
pub mod error;
pub mod handoff;
pub mod http;
pub mod models;
pub mod sessions;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use handoff::{HandOff, TelegramUser, parse_web_view_url};
pub use http::{build_client, default_headers};
pub use models::{AuthResponse, ClaimResponse, DailyRewards, Farming, PitchUser};
pub use sessions::{HandOffSource, SessionEntry, SessionStore, normalize_phone};
pub use token::{decode_expiry_ms, exchange_hand_off};
