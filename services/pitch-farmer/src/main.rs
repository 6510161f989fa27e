//! Pitch Farmer
//!
//! Single-binary service that:
//! 1. Loads every account from the session store
//! 2. Logs each account in through its messenger hand-off
//! 3. Polls and claims the farming reward per account until SIGTERM/SIGINT
//!
//! Also manages the session store (`add-session`, `list-sessions`).

mod cli;
mod config;
mod error;
mod metrics;
mod notify;
mod status;
mod supervisor;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use pitch_auth::{HandOffSource, SessionEntry, SessionStore, normalize_phone};
use pitch_farm::{Clock, EventBus, Farmer, FarmerOptions, SystemClock};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::{Config, LogFormat};
use crate::notify::{ConsoleLogger, DiscordNotifier};
use crate::status::StatusState;
use crate::supervisor::{Summary, Supervisor};

/// How long account tasks get to wind down after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long queued notifications get to flush on exit.
const NOTIFY_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = if cli.config.is_some() {
        Config::load(&config_path)
    } else {
        Config::load_or_default(&config_path)
    }
    .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    init_tracing(config.log_format);
    info!(
        path = %config_path.display(),
        base_url = %config.api.base_url,
        poll_interval_secs = config.api.poll_interval_secs,
        sessions = %config.sessions.path.display(),
        discord = config.webhook_url().is_some(),
        "configuration loaded"
    );

    match cli.action() {
        Command::Start => start(config).await,
        Command::AddSession(add) => {
            let account = add_session(&config.sessions.path, &add.phone, add.source()).await?;
            info!(account = %account, "session saved");
            Ok(())
        }
        Command::ListSessions => {
            for line in list_sessions(&config.sessions.path).await? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Initialize tracing with LOG_LEVEL / RUST_LOG support and the configured layer.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

/// Run every stored account until a shutdown signal or until all have ended.
async fn start(config: Config) -> Result<()> {
    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    let store = SessionStore::load(config.sessions.path.clone())
        .await
        .with_context(|| format!("failed to load sessions from {}", config.sessions.path.display()))?;
    let entries = store.entries().await;
    if entries.is_empty() {
        return Err(error::Error::NoSessions(config.sessions.path.display().to_string()).into());
    }

    let http = pitch_auth::build_client(config.api.timeout()).context("failed to build HTTP client")?;

    let mut bus = EventBus::builder().subscribe(Arc::new(ConsoleLogger));
    let mut notifier_task = None;
    if let Some(webhook_url) = config.webhook_url() {
        let (notifier, task) = DiscordNotifier::spawn(reqwest::Client::new(), webhook_url.clone());
        bus = bus.subscribe(Arc::new(notifier));
        notifier_task = Some(task);
        info!("discord notifications enabled");
    }
    let events = Arc::new(bus.build());

    let cancel = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let options = FarmerOptions {
        base_url: config.api.base_url.clone(),
        poll_interval: config.api.poll_interval(),
    };
    let accounts_total = entries.len();

    let mut supervisor = Supervisor::new();
    for (account, entry) in entries {
        let messenger = entry.messenger(&account, config.messenger.command_timeout());
        let farmer = Farmer::new(
            account.clone(),
            http.clone(),
            messenger,
            events.clone(),
            clock.clone(),
            options.clone(),
        );
        supervisor.spawn(account, farmer.run(cancel.child_token()));
    }
    drop(events);
    info!(accounts = accounts_total, "farming started");

    if let Some(status) = &config.status {
        let listener = TcpListener::bind(status.listen_addr)
            .await
            .with_context(|| format!("failed to bind status endpoint to {}", status.listen_addr))?;
        let app = status::build_router(
            StatusState {
                prometheus,
                started_at: Instant::now(),
                accounts_total,
                accounts_running: supervisor.running(),
            },
            status.max_connections,
        );
        let token = cancel.clone();
        info!(addr = %status.listen_addr, "status endpoint listening");
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "status endpoint failed");
            }
        });
    }

    let abort = supervisor.abort_handle();
    let mut waiter = tokio::spawn(supervisor.wait_all());
    let summary = tokio::select! {
        joined = &mut waiter => {
            warn!("every account task has ended");
            joined.context("supervisor task panicked")?
        }
        _ = shutdown_signal() => {
            cancel.cancel();
            match tokio::time::timeout(DRAIN_TIMEOUT, &mut waiter).await {
                Ok(joined) => joined.context("supervisor task panicked")?,
                Err(_) => {
                    warn!(
                        drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                        "drain timeout exceeded, forcing shutdown"
                    );
                    abort.abort();
                    waiter.abort();
                    Summary::default()
                }
            }
        }
    };
    cancel.cancel();

    if let Some(task) = notifier_task
        && tokio::time::timeout(NOTIFY_FLUSH_TIMEOUT, task).await.is_err()
    {
        warn!("pending discord notifications dropped");
    }

    info!(
        stopped = summary.stopped,
        failed = summary.failed,
        panicked = summary.panicked,
        "shutdown complete"
    );
    Ok(())
}

/// Record a session for `phone`, returning the normalized account id.
async fn add_session(store_path: &Path, phone: &str, source: HandOffSource) -> Result<String> {
    let account = normalize_phone(phone)?;
    let store = SessionStore::load(store_path.to_path_buf())
        .await
        .with_context(|| format!("failed to load sessions from {}", store_path.display()))?;
    store.add(&account, SessionEntry::new(source)).await?;
    Ok(account)
}

/// One line per stored account: id, hand-off kind, when it was added.
async fn list_sessions(store_path: &Path) -> Result<Vec<String>> {
    let store = SessionStore::load(store_path.to_path_buf())
        .await
        .with_context(|| format!("failed to load sessions from {}", store_path.display()))?;
    Ok(store
        .entries()
        .await
        .into_iter()
        .map(|(account, entry)| {
            let kind = match &entry.source {
                HandOffSource::WebAppUrl { .. } => "web_app_url".to_string(),
                HandOffSource::Command { program, .. } => format!("command ({program})"),
            };
            format!("{account}\t{kind}\t{}", entry.added_at.to_rfc3339())
        })
        .collect())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
