//! Application-level configuration loading, including chat and history limits.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CLASS_PULSE_CONFIG_PATH";

/// Default chat rate limit: messages allowed per window.
const DEFAULT_CHAT_RATE_MAX: u32 = 5;
/// Default chat rate limit window.
const DEFAULT_CHAT_RATE_WINDOW_MS: u64 = 5_000;
/// Default number of chat messages replayed to a joining client.
const DEFAULT_CHAT_HISTORY_LIMIT: u32 = 50;
/// Default capacity of the in-memory chat fallback ring.
const DEFAULT_CHAT_BUFFER_CAPACITY: usize = 100;
/// Default number of ended polls returned by the history endpoint.
const DEFAULT_POLL_HISTORY_LIMIT: u32 = 50;
/// Default delay between the kick notice and the forced close.
const DEFAULT_KICK_GRACE_MS: u64 = 200;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    chat_rate_max: u32,
    chat_rate_window: Duration,
    chat_history_limit: u32,
    chat_buffer_capacity: usize,
    poll_history_limit: u32,
    kick_grace: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Maximum chat messages a connection may send per window.
    pub fn chat_rate_max(&self) -> u32 {
        self.chat_rate_max
    }

    /// Length of the sliding chat rate-limit window.
    pub fn chat_rate_window(&self) -> Duration {
        self.chat_rate_window
    }

    /// Number of chat messages replayed to a joining client.
    pub fn chat_history_limit(&self) -> u32 {
        self.chat_history_limit
    }

    /// Capacity of the in-memory chat fallback ring.
    pub fn chat_buffer_capacity(&self) -> usize {
        self.chat_buffer_capacity
    }

    /// Number of ended polls returned by the history endpoint.
    pub fn poll_history_limit(&self) -> u32 {
        self.poll_history_limit
    }

    /// Delay between the kick notice and the forced connection close.
    pub fn kick_grace(&self) -> Duration {
        self.kick_grace
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat_rate_max: DEFAULT_CHAT_RATE_MAX,
            chat_rate_window: Duration::from_millis(DEFAULT_CHAT_RATE_WINDOW_MS),
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
            chat_buffer_capacity: DEFAULT_CHAT_BUFFER_CAPACITY,
            poll_history_limit: DEFAULT_POLL_HISTORY_LIMIT,
            kick_grace: Duration::from_millis(DEFAULT_KICK_GRACE_MS),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    chat_rate_max: Option<u32>,
    chat_rate_window_ms: Option<u64>,
    chat_history_limit: Option<u32>,
    chat_buffer_capacity: Option<usize>,
    poll_history_limit: Option<u32>,
    kick_grace_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            chat_rate_max: value.chat_rate_max.unwrap_or(defaults.chat_rate_max),
            chat_rate_window: value
                .chat_rate_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.chat_rate_window),
            chat_history_limit: value
                .chat_history_limit
                .unwrap_or(defaults.chat_history_limit),
            chat_buffer_capacity: value
                .chat_buffer_capacity
                .unwrap_or(defaults.chat_buffer_capacity),
            poll_history_limit: value
                .poll_history_limit
                .unwrap_or(defaults.poll_history_limit),
            kick_grace: value
                .kick_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.kick_grace),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
