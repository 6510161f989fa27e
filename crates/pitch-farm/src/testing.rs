//! Shared fixtures for unit tests: recording subscriber, counting fake
//! handshake and a local fake Pitch API.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use pitch_auth::{AuthResponse, DailyRewards, Farming, PitchUser};
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::events::{Event, Subscriber, SubscriberError};
use crate::handshake::{Handshake, Session};

/// 2024-10-20T08:00:00Z
pub(crate) const T0_MS: i64 = 1_729_411_200_000;

/// In-memory log sink for asserting on what a code path logged.
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// A plain-text subscriber writing into this capture.
    pub(crate) fn logger(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish()
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub(crate) fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("valid timestamp")
}

/// JWT-shaped token whose `exp` claim is `expires_at_ms / 1000`.
pub(crate) fn token_expiring_at(expires_at_ms: i64) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u-1","exp":{}}}"#, expires_at_ms / 1000))
    )
}

pub(crate) fn user(coins: f64) -> PitchUser {
    serde_json::from_value(serde_json::json!({
        "id": "u-1",
        "telegramId": "5550001",
        "username": "farmer",
        "coins": coins,
        "tickets": 3,
        "loginStreak": 5
    }))
    .expect("valid user")
}

pub(crate) fn farming_ending_at(end_ms: i64) -> Farming {
    Farming {
        id: "f-1".into(),
        user_id: Some("u-1".into()),
        start_time: at(end_ms - 8 * 3_600_000),
        end_time: at(end_ms),
        is_claimed: false,
        is_active: true,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn auth_response(token: String, daily: DailyRewards) -> AuthResponse {
    AuthResponse {
        access_token: token,
        user: user(1_000.0),
        is_new_user: false,
        daily_rewards: daily,
    }
}

/// Subscriber that records every event it sees.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.kind.name()).collect()
    }
}

impl Subscriber for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_event(&self, event: &Event) -> std::result::Result<(), SubscriberError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Handshake double that counts calls and hands out tokens expiring at a
/// fixed instant.
pub(crate) struct FakeHandshake {
    calls: AtomicUsize,
    expires_at_ms: i64,
    delay: Duration,
    fail: bool,
}

impl FakeHandshake {
    pub(crate) fn new(expires_at_ms: i64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            expires_at_ms,
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub(crate) fn slow(expires_at_ms: i64, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(expires_at_ms)
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn session(expires_at_ms: i64) -> Session {
    let token = token_expiring_at(expires_at_ms);
    Session {
        access_token: token.clone(),
        expires_at_ms,
        hand_off: "query_id=AAH&user=%7B%22id%22%3A5550001%7D&hash=abc".into(),
        response: auth_response(
            token,
            DailyRewards {
                coins: 0.0,
                tickets: 0,
                login_streak: 1,
                is_new_day: false,
            },
        ),
    }
}

impl Handshake for FakeHandshake {
    fn authenticate(&self) -> Pin<Box<dyn Future<Output = Result<Session>> + Send + '_>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::Handshake("web view URL has no fragment".into()));
            }
            let mut session = session(self.expires_at_ms);
            session.access_token = format!("{}-{call}", session.access_token);
            Ok(session)
        })
    }
}

/// What the fake `GET /v1/api/farmings` answers.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CheckReply {
    Window { end_ms: i64 },
    NotModified,
}

/// What the fake `POST /v1/api/users/claim-farming` answers.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ClaimReply {
    Window { next_end_ms: i64, coins: f64 },
    Status(u16),
}

/// Local fake of the Pitch API with scriptable replies.
pub(crate) struct FakeApi {
    pub(crate) url: String,
    check: Mutex<CheckReply>,
    claim: Mutex<ClaimReply>,
    pub(crate) check_calls: AtomicUsize,
    pub(crate) claim_calls: AtomicUsize,
    headers: Mutex<Vec<HeaderMap>>,
}

impl FakeApi {
    pub(crate) async fn start(check: CheckReply, claim: ClaimReply) -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = Arc::new(Self {
            url: format!("http://{}", listener.local_addr().unwrap()),
            check: Mutex::new(check),
            claim: Mutex::new(claim),
            check_calls: AtomicUsize::new(0),
            claim_calls: AtomicUsize::new(0),
            headers: Mutex::new(Vec::new()),
        });

        let check_api = api.clone();
        let claim_api = api.clone();
        let app = axum::Router::new()
            .route(
                pitch_auth::FARMINGS_PATH,
                axum::routing::get(move |headers: HeaderMap| {
                    let api = check_api.clone();
                    async move { api.answer_check(headers) }
                }),
            )
            .route(
                pitch_auth::CLAIM_FARMING_PATH,
                axum::routing::post(move |headers: HeaderMap| {
                    let api = claim_api.clone();
                    async move { api.answer_claim(headers).await }
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        api
    }

    pub(crate) fn set_claim(&self, reply: ClaimReply) {
        *self.claim.lock().unwrap() = reply;
    }

    pub(crate) fn headers(&self) -> Vec<HeaderMap> {
        self.headers.lock().unwrap().clone()
    }

    fn answer_check(&self, headers: HeaderMap) -> Response {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.headers.lock().unwrap().push(headers);
        let reply = *self.check.lock().unwrap();
        match reply {
            CheckReply::Window { end_ms } => {
                axum::Json(farming_ending_at(end_ms)).into_response()
            }
            CheckReply::NotModified => StatusCode::NOT_MODIFIED.into_response(),
        }
    }

    async fn answer_claim(&self, headers: HeaderMap) -> Response {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        self.headers.lock().unwrap().push(headers);
        let reply = *self.claim.lock().unwrap();
        match reply {
            ClaimReply::Window { next_end_ms, coins } => axum::Json(pitch_auth::ClaimResponse {
                user: user(coins),
                farming: farming_ending_at(next_end_ms),
            })
            .into_response(),
            ClaimReply::Status(code) => (
                StatusCode::from_u16(code).unwrap(),
                axum::Json(serde_json::json!({"message": "farming not finished"})),
            )
                .into_response(),
        }
    }
}
