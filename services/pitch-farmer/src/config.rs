//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Discord webhook URL is loaded from DISCORD_WEBHOOK_URL or
//! webhook_url_file, never stored in the TOML directly to avoid leaking it.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub messenger: MessengerConfig,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub status: Option<StatusConfig>,
}

/// Log output layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Target API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session store location
#[derive(Debug, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_path")]
    pub path: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            path: default_sessions_path(),
        }
    }
}

/// Messenger helper settings
#[derive(Debug, Deserialize)]
pub struct MessengerConfig {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl MessengerConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Discord notifier; present section enables it
#[derive(Debug, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(skip)]
    pub webhook_url: Option<Secret<String>>,
    /// Path to a file containing the webhook URL (alternative to DISCORD_WEBHOOK_URL)
    #[serde(default)]
    pub webhook_url_file: Option<PathBuf>,
}

/// Local status endpoint (/health, /metrics)
#[derive(Debug, Deserialize)]
pub struct StatusConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_base_url() -> String {
    pitch_auth::API_BASE_URL.to_string()
}

fn default_poll_interval() -> u64 {
    600
}

fn default_timeout() -> u64 {
    30
}

fn default_sessions_path() -> PathBuf {
    PathBuf::from("sessions/sessions.json")
}

fn default_command_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    64
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file at the default location yields the defaults; an explicit
    /// path that does not exist is an error.
    ///
    /// Webhook URL resolution order:
    /// 1. DISCORD_WEBHOOK_URL env var
    /// 2. webhook_url_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;
        config.resolve_webhook()?;
        Ok(config)
    }

    /// Like `load`, but a missing file means "all defaults".
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.resolve_webhook()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.poll_interval_secs == 0 {
            return Err(common::Error::Config(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.messenger.command_timeout_secs == 0 {
            return Err(common::Error::Config(
                "command_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(status) = &self.status
            && status.max_connections == 0
        {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// The env var alone enables the notifier even without a `[discord]` section.
    fn resolve_webhook(&mut self) -> common::Result<()> {
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL")
            && !url.trim().is_empty()
        {
            let discord = self.discord.get_or_insert_with(DiscordConfig::default);
            discord.webhook_url = Some(Secret::new(url.trim().to_owned()));
            return Ok(());
        }

        if let Some(discord) = self.discord.as_mut() {
            match &discord.webhook_url_file {
                Some(file) => {
                    let url = Secret::from_file(file).map_err(|e| {
                        common::Error::Config(format!(
                            "failed to read webhook_url_file {}: {e}",
                            file.display()
                        ))
                    })?;
                    discord.webhook_url = Some(url);
                }
                None => {
                    return Err(common::Error::Config(
                        "[discord] needs webhook_url_file or DISCORD_WEBHOOK_URL".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve config file path from `--config` (or CONFIG_PATH) or the default.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        cli_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("pitch-farmer.toml"))
    }

    pub fn webhook_url(&self) -> Option<&Secret<String>> {
        self.discord.as_ref().and_then(|d| d.webhook_url.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("pitch-farmer.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DISCORD_WEBHOOK_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
log_format = "pretty"

[api]
base_url = "https://api.pitchtalk.app"
poll_interval_secs = 300

[sessions]
path = "/var/lib/pitch/sessions.json"

[status]
listen_addr = "127.0.0.1:9184"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.api.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(
            config.sessions.path,
            PathBuf::from("/var/lib/pitch/sessions.json")
        );
        assert_eq!(config.messenger.command_timeout_secs, 60);
        assert_eq!(config.status.as_ref().unwrap().max_connections, 64);
        assert!(config.webhook_url().is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DISCORD_WEBHOOK_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.api.base_url, "https://api.pitchtalk.app");
        assert_eq!(config.api.poll_interval_secs, 600);
        assert!(config.discord.is_none());
        assert!(config.status.is_none());
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DISCORD_WEBHOOK_URL") };
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.sessions.path, PathBuf::from("sessions/sessions.json"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"ftp://example.com\"\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("base_url"), "got {err}");
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\npoll_interval_secs = 0\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"), "got {err}");
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "log_format = \"xml\"\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_webhook_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DISCORD_WEBHOOK_URL") };
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("webhook");
        std::fs::write(&secret, "https://discord.com/api/webhooks/1/abc\n").unwrap();
        let path = write_config(
            &dir,
            &format!("[discord]\nwebhook_url_file = \"{}\"\n", secret.display()),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.webhook_url().unwrap().expose(),
            "https://discord.com/api/webhooks/1/abc"
        );
    }

    #[test]
    fn test_webhook_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("webhook");
        std::fs::write(&secret, "https://discord.com/api/webhooks/1/file").unwrap();
        let path = write_config(
            &dir,
            &format!("[discord]\nwebhook_url_file = \"{}\"\n", secret.display()),
        );

        unsafe { set_env("DISCORD_WEBHOOK_URL", "https://discord.com/api/webhooks/1/env") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("DISCORD_WEBHOOK_URL") };

        assert_eq!(
            config.webhook_url().unwrap().expose(),
            "https://discord.com/api/webhooks/1/env"
        );
    }

    #[test]
    fn test_discord_section_without_source_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DISCORD_WEBHOOK_URL") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[discord]\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("DISCORD_WEBHOOK_URL"), "got {err}");
    }

    #[test]
    fn test_resolve_path_cli_wins() {
        let path = Config::resolve_path(Some(Path::new("/etc/pitch/farmer.toml")));
        assert_eq!(path, PathBuf::from("/etc/pitch/farmer.toml"));
    }

    #[test]
    fn test_resolve_path_default() {
        assert_eq!(Config::resolve_path(None), PathBuf::from("pitch-farmer.toml"));
    }
}
