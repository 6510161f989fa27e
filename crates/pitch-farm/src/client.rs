//! Authenticated request pipeline
//!
//! Every call goes through `send`: refresh the token if stale, attach the
//! bearer token and the hand-off hash, log the exchange. Browser-like
//! default headers come from the `reqwest::Client` built by
//! `pitch_auth::build_client`.

use std::sync::Arc;

use pitch_auth::{CLAIM_FARMING_PATH, ClaimResponse, FARMINGS_PATH, Farming, TELEGRAM_HASH_HEADER};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::handshake::Handshake;
use crate::token::TokenManager;

/// Pitch API client for one account.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    handshake: Arc<dyn Handshake>,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        handshake: Arc<dyn Handshake>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            handshake,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Current farming window. HTTP 304 maps to `Error::NotModified`.
    pub async fn check_farming(&self) -> Result<Farming> {
        let (status, body) = self.send(Method::GET, FARMINGS_PATH).await?;
        if status == StatusCode::NOT_MODIFIED {
            return Err(Error::NotModified);
        }
        decode(status, &body)
    }

    /// Claim the finished window and start the next one.
    pub async fn claim_farming(&self) -> Result<ClaimResponse> {
        let (status, body) = self.send(Method::POST, CLAIM_FARMING_PATH).await?;
        decode(status, &body)
    }

    /// Pre-request hook, request, post-response hook.
    ///
    /// `TokenBusy` from the refresh lock is returned unchanged; nothing is
    /// retried here.
    async fn send(&self, method: Method, path: &str) -> Result<(StatusCode, String)> {
        self.tokens.ensure_fresh(self.handshake.as_ref()).await?;
        let credentials = self.tokens.credentials().await;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = credentials.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Http(format!("invalid token value: {e}")))?;
            value.set_sensitive(true);
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(hand_off) = credentials.hand_off {
            let value = HeaderValue::from_str(&hand_off)
                .map_err(|e| Error::Http(format!("invalid hand-off value: {e}")))?;
            request = request.header(TELEGRAM_HASH_HEADER, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("{method} {url}: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("{method} {url}: reading body: {e}")))?;

        debug!(
            %method,
            url = %url,
            status = status.as_u16(),
            body = %body,
            "api response"
        );
        Ok((status, body))
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        return Err(Error::Http(format!("status {}: {body}", status.as_u16())));
    }
    serde_json::from_str(body).map_err(|e| Error::Http(format!("invalid response body: {e}")))
}
