//! Hand-off exchange and bearer-token decoding
//!
//! `exchange_hand_off` trades the init data for an access token at
//! `POST /v1/api/auth`. The response carries no explicit lifetime, so the
//! expiry is read from the token itself: the middle JWT segment is base64url
//! JSON with an `exp` claim in seconds.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::constants::{AUTH_PATH, TELEGRAM_HASH_HEADER};
use crate::error::{Error, Result};
use crate::handoff::HandOff;
use crate::models::AuthResponse;

/// base64url that tolerates both padded and unpadded segments
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body of the auth request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    telegram_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    hash: &'a str,
    referral_code: &'a str,
    photo_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: f64,
}

/// Exchange a hand-off payload for an access token and account snapshot.
///
/// The init data travels both as the `hash` field and as the
/// `X-Telegram-Hash` header; the API rejects requests where they differ.
#[instrument(skip_all, fields(telegram_id = hand_off.user.id))]
pub async fn exchange_hand_off(
    client: &reqwest::Client,
    base_url: &str,
    hand_off: &HandOff,
) -> Result<AuthResponse> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), AUTH_PATH);
    let body = AuthRequest {
        telegram_id: hand_off.user.id.to_string(),
        username: hand_off.user.username.as_deref(),
        hash: &hand_off.init_data,
        referral_code: "",
        photo_url: "",
    };

    let response = client
        .post(&url)
        .header(TELEGRAM_HASH_HEADER, &hand_off.init_data)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("auth request failed: {e}")))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading auth response: {e}")))?;
    debug!(method = "POST", %url, %status, body = %text, "got response");

    if !status.is_success() {
        return Err(Error::Http(format!("auth endpoint returned {status}: {text}")));
    }

    serde_json::from_str::<AuthResponse>(&text)
        .map_err(|e| Error::Http(format!("invalid auth response: {e}")))
}

/// Read the `exp` claim of a JWT-shaped token as unix milliseconds.
///
/// The signature is not verified; the token is only inspected to schedule
/// its refresh.
pub fn decode_expiry_ms(token: &str) -> Result<i64> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::TokenDecode("token has no claims segment".into()))?;
    let bytes = CLAIMS_ENGINE
        .decode(segment)
        .map_err(|e| Error::TokenDecode(format!("claims segment is not base64url: {e}")))?;
    let claims: TokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::TokenDecode(format!("claims missing numeric exp: {e}")))?;
    let ms = (claims.exp * 1000.0).round();
    if !ms.is_finite() || ms < i64::MIN as f64 || ms >= i64::MAX as f64 {
        return Err(Error::TokenDecode(format!("exp {} out of range", claims.exp)));
    }
    Ok(ms as i64)
}
