//! Wire models for the Pitch web API
//!
//! Field names follow the API's camelCase JSON. Only the fields the engine
//! or its observers read are required; the rest default so that additive
//! API changes do not break deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account snapshot returned by auth and claim responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchUser {
    pub id: String,
    pub telegram_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub referral_by_id: Option<String>,
    #[serde(default)]
    pub last_referral_reward_claim: Option<String>,
    #[serde(default)]
    pub farming_id: Option<String>,
    #[serde(default)]
    pub referral_rewards: f64,
    #[serde(default)]
    pub login_streak: u32,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub coins: f64,
    #[serde(default)]
    pub tickets: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub role: Option<String>,
}

impl PitchUser {
    /// Username for display, falling back to the Telegram id.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.telegram_id)
    }
}

/// Daily login reward block of the auth response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRewards {
    #[serde(default)]
    pub coins: f64,
    #[serde(default)]
    pub tickets: u64,
    #[serde(default)]
    pub login_streak: u32,
    #[serde(default)]
    pub is_new_day: bool,
}

/// Response of `POST /v1/api/auth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: PitchUser,
    #[serde(default)]
    pub is_new_user: bool,
    pub daily_rewards: DailyRewards,
}

/// Current farming window.
///
/// `end_time` is the instant from which the reward can be claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farming {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_claimed: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    // The farmings endpoint spells this `updateAt`
    #[serde(default, alias = "updateAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Farming {
    /// Claim deadline as unix milliseconds.
    pub fn next_claim_ms(&self) -> i64 {
        self.end_time.timestamp_millis()
    }
}

/// Response of `POST /v1/api/users/claim-farming`: the updated user plus the
/// farming window that just started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResponse {
    #[serde(flatten)]
    pub user: PitchUser,
    pub farming: Farming,
}
