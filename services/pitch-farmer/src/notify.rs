//! Event subscribers: console logging and Discord webhook relay

use std::time::Duration;

use common::Secret;
use pitch_farm::{Event, EventKind, Subscriber, SubscriberError};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Maximum number of retries for rate-limited webhook posts.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Logs every event with the account label.
pub struct ConsoleLogger;

impl Subscriber for ConsoleLogger {
    fn name(&self) -> &str {
        "console"
    }

    fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
        let account = event.account.as_str();
        match &event.kind {
            EventKind::Login(auth) => info!(
                account,
                user = auth.user.display_name(),
                coins = auth.user.coins,
                tickets = auth.user.tickets,
                new_user = auth.is_new_user,
                "login"
            ),
            EventKind::DailyReward { user, rewards } => info!(
                account,
                user = user.display_name(),
                coins = rewards.coins,
                tickets = rewards.tickets,
                streak = rewards.login_streak,
                "daily reward"
            ),
            EventKind::FarmCheck(farming) => info!(
                account,
                next_claim = %farming.end_time.to_rfc3339(),
                "farming checked"
            ),
            EventKind::FarmClaim(claimed) => info!(
                account,
                balance = claimed.user.coins,
                next_claim = %claimed.farming.end_time.to_rfc3339(),
                "farming claimed"
            ),
        }
        Ok(())
    }
}

/// Render the chat message for an event, if it warrants one.
///
/// Only successful claims and first-of-the-day logins are relayed.
pub fn render_message(event: &Event) -> Option<String> {
    let body = match &event.kind {
        EventKind::FarmClaim(claimed) => format!(
            "pitch farming claim success\n\
             account     : {} {} ({})\n\
             balance     : {}\n\
             next_claim  : {}",
            event.account,
            claimed.user.display_name(),
            claimed.user.telegram_id,
            claimed.user.coins,
            claimed.farming.end_time.format("%Y-%m-%d %H:%M:%S UTC"),
        ),
        EventKind::DailyReward { user, rewards } if rewards.is_new_day => format!(
            "pitch daily login claim success\n\
             account       : {} {} ({})\n\
             daily_coins   : {}\n\
             daily_tickets : {}\n\
             daily_streak  : {}",
            event.account,
            user.display_name(),
            user.telegram_id,
            rewards.coins,
            rewards.tickets,
            rewards.login_streak,
        ),
        _ => return None,
    };
    Some(format!("```\n{body}\n```"))
}

/// Relays claim and daily-reward events to a Discord webhook.
///
/// `on_event` only enqueues; a background task does the HTTP delivery.
pub struct DiscordNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl DiscordNotifier {
    /// Start the delivery task. It ends once the notifier is dropped and the
    /// queue has drained.
    pub fn spawn(http: reqwest::Client, webhook_url: Secret<String>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(content) = rx.recv().await {
                if let Err(e) = post_with_retry(&http, &webhook_url, &content).await {
                    warn!(error = %e, "discord notification dropped");
                }
            }
            debug!("discord notifier stopped");
        });
        (Self { tx }, handle)
    }
}

impl Subscriber for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
        let Some(content) = render_message(event) else {
            return Ok(());
        };
        self.tx
            .send(content)
            .map_err(|_| SubscriberError("discord delivery task has stopped".into()))
    }
}

/// POST one message, retrying on 429 as the Retry-After header asks.
async fn post_with_retry(
    http: &reqwest::Client,
    webhook_url: &Secret<String>,
    content: &str,
) -> Result<(), String> {
    let payload = json!({ "content": content });
    let mut attempts = 0;

    loop {
        attempts += 1;
        let response = http
            .post(webhook_url.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("webhook request failed: {}", e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            debug!("discord notification sent");
            return Ok(());
        }

        if status.as_u16() == 429 && attempts < MAX_RATE_LIMIT_RETRIES {
            let wait = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .map(Duration::from_secs_f64)
                .unwrap_or(Duration::from_secs(1));
            debug!(wait_ms = wait.as_millis() as u64, attempts, "discord rate limited");
            tokio::time::sleep(wait).await;
            continue;
        }

        let body = response.text().await.unwrap_or_default();
        return Err(format!("webhook returned {status}: {body}"));
    }
}
