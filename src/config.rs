use std::{env, path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
const DEFAULT_POLL_MS: u64 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend, without a trailing slash.
    pub server: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub credentials: Option<Credentials>,
    /// Where the terminal front end puts completed files, if anywhere.
    pub save_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: DEFAULT_SERVER.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credentials: None,
            save_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let server = lookup("TUBE_DROGUE_SERVER")
            .map(|server| server.trim_end_matches('/').to_string())
            .filter(|server| !server.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let poll_ms = parse_or("TUBE_DROGUE_POLL_MS", lookup("TUBE_DROGUE_POLL_MS"), DEFAULT_POLL_MS);
        let timeout_secs = parse_or(
            "TUBE_DROGUE_TIMEOUT_SECS",
            lookup("TUBE_DROGUE_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        );
        let credentials = lookup("TUBE_DROGUE_USER").map(|user| Credentials {
            user,
            password: lookup("TUBE_DROGUE_PASSWORD"),
        });

        Config {
            server,
            // A zero period would spin the poller.
            poll_interval: Duration::from_millis(poll_ms.max(1)),
            request_timeout: Duration::from_secs(timeout_secs),
            credentials,
            save_dir: lookup("TUBE_DROGUE_SAVE_DIR").map(PathBuf::from),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {}={:?}", key, raw);
            default
        }),
    }
}
