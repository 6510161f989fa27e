//! Web-app hand-off payload parsing
//!
//! The messaging platform answers a web-view request with a URL whose
//! fragment is form-urlencoded and contains `tgWebAppData`. That value is
//! itself a form-urlencoded init-data string (`query_id`, `user`,
//! `auth_date`, `hash`); its `user` entry is a JSON descriptor of the
//! Telegram account. The raw init-data string is what the API verifies, so
//! it is kept verbatim.

use serde::Deserialize;
use url::Url;
use url::form_urlencoded;

use crate::error::{Error, Result};

/// Fragment key carrying the signed init data
const WEB_APP_DATA_KEY: &str = "tgWebAppData";

/// Telegram account descriptor embedded in the init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// One-time hand-off material extracted from a web-view URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandOff {
    /// Raw init-data string, sent as `hash` and `X-Telegram-Hash`
    pub init_data: String,
    pub user: TelegramUser,
}

/// Extract the hand-off payload from a web-view URL.
///
/// Fails with `Error::Handshake` when the fragment, the init data, or its
/// `user` descriptor is missing or malformed.
pub fn parse_web_view_url(web_view_url: &str) -> Result<HandOff> {
    let url = Url::parse(web_view_url)
        .map_err(|e| Error::Handshake(format!("web view URL unparseable: {e}")))?;
    let fragment = url
        .fragment()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::Handshake("web view URL has no fragment".into()))?;

    let init_data = form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == WEB_APP_DATA_KEY)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Handshake(format!("fragment has no {WEB_APP_DATA_KEY}")))?;

    let user_json = form_urlencoded::parse(init_data.as_bytes())
        .find(|(key, _)| key == "user")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Handshake("init data user is empty".into()))?;

    let user: TelegramUser = serde_json::from_str(&user_json)
        .map_err(|e| Error::Handshake(format!("init data user is not valid JSON: {e}")))?;

    Ok(HandOff { init_data, user })
}
