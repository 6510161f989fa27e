//! HTTP client construction
//!
//! The API sits behind the same CDN rules as the web app, so every request
//! carries the headers an Edge WebView2 client would send.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::constants::{SEC_CH_UA, USER_AGENT, WEB_APP_ORIGIN, WEB_APP_URL};

/// Default headers attached to every API request.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    let statics: [(HeaderName, &'static str); 12] = [
        (HeaderName::from_static("sec-ch-ua-platform"), "\"Windows\""),
        (HeaderName::from_static("sec-ch-ua"), SEC_CH_UA),
        (HeaderName::from_static("sec-ch-ua-mobile"), "?0"),
        (HeaderName::from_static("sec-fetch-site"), "same-site"),
        (HeaderName::from_static("sec-fetch-mode"), "cors"),
        (HeaderName::from_static("sec-fetch-dest"), "empty"),
        (HeaderName::from_static("priority"), "u=1, i"),
        (header::ACCEPT, "application/json, text/plain, */*"),
        (header::ACCEPT_LANGUAGE, "en-US,en;q=0.9"),
        (header::USER_AGENT, USER_AGENT),
        (header::ORIGIN, WEB_APP_ORIGIN),
        (header::REFERER, WEB_APP_URL),
    ];
    for (name, value) in statics {
        headers.insert(name, HeaderValue::from_static(value));
    }
    headers
}

/// Build the shared HTTP client with default headers and a request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(default_headers())
        .timeout(timeout)
        .build()
}
