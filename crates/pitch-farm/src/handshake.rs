//! Messenger hand-off to bearer token
//!
//! Steps: connect messenger → request web view for `PITCH_BOT_ID` →
//! disconnect → parse init data → `POST /v1/api/auth` → decode `exp` →
//! publish `Login` (and `DailyReward` on a new day).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use messenger::{Messenger, WebViewRequest};
use pitch_auth::{
    AuthResponse, PITCH_BOT_ID, WEB_APP_URL, WEB_VIEW_PLATFORM, decode_expiry_ms,
    exchange_hand_off, parse_web_view_url,
};
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::events::{Event, EventBus, EventKind};

/// Outcome of a successful handshake.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    /// `exp` claim in unix milliseconds
    pub expires_at_ms: i64,
    /// Raw init data, re-sent as `X-Telegram-Hash`
    pub hand_off: String,
    pub response: AuthResponse,
}

/// Something that can log an account in from scratch.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Handshake>`).
pub trait Handshake: Send + Sync {
    fn authenticate(&self) -> Pin<Box<dyn Future<Output = Result<Session>> + Send + '_>>;
}

/// The production handshake against the Pitch API.
pub struct AuthHandshake {
    account: String,
    messenger: Arc<dyn Messenger>,
    http: reqwest::Client,
    base_url: String,
    events: Arc<EventBus>,
}

impl AuthHandshake {
    pub fn new(
        account: impl Into<String>,
        messenger: Arc<dyn Messenger>,
        http: reqwest::Client,
        base_url: impl Into<String>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            account: account.into(),
            messenger,
            http,
            base_url: base_url.into(),
            events,
        }
    }

    /// Obtain a web-view URL, holding the messenger connection only for the
    /// duration of the request.
    async fn request_web_view(&self) -> Result<String> {
        self.messenger.connect().await?;
        let request = WebViewRequest {
            bot: PITCH_BOT_ID.to_string(),
            url: WEB_APP_URL.to_string(),
            platform: WEB_VIEW_PLATFORM.to_string(),
        };
        let result = self.messenger.request_web_view(&request).await;
        self.messenger.disconnect().await;
        debug!(account = %self.account, messenger = self.messenger.id(), "messenger released");
        Ok(result?)
    }

    #[instrument(skip_all, fields(account = %self.account))]
    pub async fn login(&self) -> Result<Session> {
        let web_view_url = self.request_web_view().await?;
        let hand_off = parse_web_view_url(&web_view_url)?;
        let response = exchange_hand_off(&self.http, &self.base_url, &hand_off).await?;
        let expires_at_ms = decode_expiry_ms(&response.access_token)?;

        info!(
            account = %self.account,
            user = response.user.display_name(),
            expires_at_ms,
            "handshake complete"
        );

        self.events
            .publish(&Event::new(&self.account, EventKind::Login(response.clone())));
        if response.daily_rewards.is_new_day {
            self.events.publish(&Event::new(
                &self.account,
                EventKind::DailyReward {
                    user: response.user.clone(),
                    rewards: response.daily_rewards.clone(),
                },
            ));
        }

        Ok(Session {
            access_token: response.access_token.clone(),
            expires_at_ms,
            hand_off: hand_off.init_data,
            response,
        })
    }
}

impl Handshake for AuthHandshake {
    fn authenticate(&self) -> Pin<Box<dyn Future<Output = Result<Session>> + Send + '_>> {
        Box::pin(self.login())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{Recorder, T0_MS, auth_response, token_expiring_at};
    use axum::http::StatusCode;
    use messenger::{MessengerError, StoredWebApp};
    use pitch_auth::DailyRewards;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use url::form_urlencoded;

    /// Messenger double counting connection acquire/release.
    #[derive(Default)]
    struct CountingMessenger {
        url: Option<String>,
        connects: AtomicUsize,
        disconnects: AtomicUsize,
    }

    impl Messenger for CountingMessenger {
        fn id(&self) -> &str {
            "counting"
        }

        fn connect(&self) -> Pin<Box<dyn Future<Output = messenger::Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }

        fn request_web_view<'a>(
            &'a self,
            _request: &'a WebViewRequest,
        ) -> Pin<Box<dyn Future<Output = messenger::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                self.url
                    .clone()
                    .ok_or_else(|| MessengerError::Request("FLOOD_WAIT_30".into()))
            })
        }

        fn disconnect(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                self.disconnects.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    fn web_view_url() -> String {
        let init_data = form_urlencoded::Serializer::new(String::new())
            .append_pair("query_id", "AAH")
            .append_pair("user", r#"{"id":5550001,"username":"farmer"}"#)
            .append_pair("hash", "abc")
            .finish();
        let fragment = form_urlencoded::Serializer::new(String::new())
            .append_pair("tgWebAppData", &init_data)
            .finish();
        format!("https://webapp.pitchtalk.app/#{fragment}")
    }

    async fn start_auth_server(reply: AuthResponse) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let app = axum::Router::new().route(
            pitch_auth::AUTH_PATH,
            axum::routing::post(move || {
                let reply = reply.clone();
                async move { (StatusCode::OK, axum::Json(reply)) }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        url
    }

    fn handshake(
        messenger: Arc<dyn Messenger>,
        base_url: &str,
        recorder: Arc<Recorder>,
    ) -> AuthHandshake {
        let events = Arc::new(EventBus::builder().subscribe(recorder).build());
        AuthHandshake::new(
            "628111",
            messenger,
            reqwest::Client::new(),
            base_url,
            events,
        )
    }

    #[tokio::test]
    async fn new_day_emits_daily_reward_once() {
        let expiry = T0_MS + 86_400_000;
        let rewards = DailyRewards {
            coins: 100.0,
            tickets: 2,
            login_streak: 5,
            is_new_day: true,
        };
        let base_url = start_auth_server(auth_response(token_expiring_at(expiry), rewards.clone())).await;
        let recorder = Arc::new(Recorder::default());
        let messenger = Arc::new(StoredWebApp::new(web_view_url()));

        let session = handshake(messenger, &base_url, recorder.clone())
            .login()
            .await
            .unwrap();

        assert_eq!(session.expires_at_ms, expiry);
        assert!(session.hand_off.contains("query_id=AAH"));
        assert_eq!(recorder.names(), vec!["login", "daily_reward"]);
        match &recorder.events()[1].kind {
            EventKind::DailyReward { rewards: got, user } => {
                assert_eq!(got, &rewards);
                assert_eq!(user.telegram_id, "5550001");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(recorder.events()[1].account, "628111");
    }

    #[tokio::test]
    async fn same_day_emits_login_only() {
        let rewards = DailyRewards {
            coins: 0.0,
            tickets: 0,
            login_streak: 5,
            is_new_day: false,
        };
        let base_url =
            start_auth_server(auth_response(token_expiring_at(T0_MS + 60_000), rewards)).await;
        let recorder = Arc::new(Recorder::default());
        let messenger = Arc::new(StoredWebApp::new(web_view_url()));

        handshake(messenger, &base_url, recorder.clone())
            .authenticate()
            .await
            .unwrap();

        assert_eq!(recorder.names(), vec!["login"]);
    }

    #[tokio::test]
    async fn messenger_is_released_when_request_fails() {
        let recorder = Arc::new(Recorder::default());
        let messenger = Arc::new(CountingMessenger::default());

        let err = handshake(messenger.clone(), "http://127.0.0.1:9", recorder.clone())
            .login()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Messenger(ref m) if m.contains("FLOOD_WAIT")));
        assert_eq!(messenger.connects.load(Ordering::SeqCst), 1);
        assert_eq!(messenger.disconnects.load(Ordering::SeqCst), 1);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn missing_fragment_is_handshake_error() {
        let recorder = Arc::new(Recorder::default());
        let messenger = Arc::new(CountingMessenger {
            url: Some("https://webapp.pitchtalk.app/".into()),
            ..Default::default()
        });

        let err = handshake(messenger.clone(), "http://127.0.0.1:9", recorder.clone())
            .login()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Handshake(_)), "got {err:?}");
        assert_eq!(messenger.disconnects.load(Ordering::SeqCst), 1);
        assert!(recorder.events().is_empty());
    }
}
