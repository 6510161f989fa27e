//! Pitch web API constants
//!
//! Public endpoints and the identity of the Telegram bot that hosts the web
//! app. None of these are secrets.

/// Production API host
pub const API_BASE_URL: &str = "https://api.pitchtalk.app";

/// Origin of the hosted web app; sent as `Origin` and used for the web-view request
pub const WEB_APP_ORIGIN: &str = "https://webapp.pitchtalk.app";

/// Web-app URL requested from the messaging platform
pub const WEB_APP_URL: &str = "https://webapp.pitchtalk.app/";

/// Telegram bot that owns the web app
pub const PITCH_BOT_ID: &str = "pitchtalk_bot";

/// Client platform reported in the web-view request
pub const WEB_VIEW_PLATFORM: &str = "android";

/// Hand-off exchange endpoint
pub const AUTH_PATH: &str = "/v1/api/auth";

/// Current farming window (authenticated)
pub const FARMINGS_PATH: &str = "/v1/api/farmings";

/// Farming reward claim (authenticated)
pub const CLAIM_FARMING_PATH: &str = "/v1/api/users/claim-farming";

/// Header carrying the raw init data on auth and authenticated calls
pub const TELEGRAM_HASH_HEADER: &str = "X-Telegram-Hash";

/// Browser identity the web app normally runs under (Edge WebView2)
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36 Edg/129.0.0.0";

pub const SEC_CH_UA: &str = "\"Microsoft Edge\";v=\"129\", \"Not=A?Brand\";v=\"8\", \"Chromium\";v=\"129\", \"Microsoft Edge WebView2\";v=\"129\"";
