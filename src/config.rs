//! Client configuration read from the environment.
//!
//! Every knob has a default so the client starts with no environment at all.
//! Unparseable values are logged and replaced by the default instead of aborting.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:5000/graphql";
pub const DEFAULT_STATE_DIR: &str = ".stayflow";

pub const ENV_GRAPHQL_URL: &str = "STAYFLOW_GRAPHQL_URL";
pub const ENV_STATE_DIR: &str = "STAYFLOW_STATE_DIR";
pub const ENV_HTTP_TIMEOUT_MS: &str = "STAYFLOW_HTTP_TIMEOUT_MS";
pub const ENV_DASHBOARD_DELAY_MS: &str = "STAYFLOW_DASHBOARD_DELAY_MS";
pub const ENV_RESET_REDIRECT_DELAY_MS: &str = "STAYFLOW_RESET_REDIRECT_DELAY_MS";
pub const ENV_NOTICE_TTL_MS: &str = "STAYFLOW_NOTICE_TTL_MS";
pub const ENV_NOTICE_CAPACITY: &str = "STAYFLOW_NOTICE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// GraphQL endpoint every operation is POSTed to.
    pub endpoint: String,
    /// Directory holding the persisted credential.
    pub state_dir: PathBuf,
    pub http_timeout: Duration,
    /// Pause between a confirmed payment and the dashboard redirect.
    pub dashboard_delay: Duration,
    /// Pause between a successful password reset and the login redirect.
    pub reset_redirect_delay: Duration,
    pub notice_ttl: Duration,
    pub notice_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GRAPHQL_URL.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            http_timeout: Duration::from_millis(15_000),
            dashboard_delay: Duration::from_millis(3_000),
            reset_redirect_delay: Duration::from_millis(2_000),
            notice_ttl: Duration::from_millis(5_000),
            notice_capacity: 16,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let endpoint = lookup(ENV_GRAPHQL_URL)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(d.endpoint);
        let state_dir = lookup(ENV_STATE_DIR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(d.state_dir);
        Self {
            endpoint,
            state_dir,
            http_timeout: millis(&lookup, ENV_HTTP_TIMEOUT_MS, d.http_timeout),
            dashboard_delay: millis(&lookup, ENV_DASHBOARD_DELAY_MS, d.dashboard_delay),
            reset_redirect_delay: millis(&lookup, ENV_RESET_REDIRECT_DELAY_MS, d.reset_redirect_delay),
            notice_ttl: millis(&lookup, ENV_NOTICE_TTL_MS, d.notice_ttl),
            notice_capacity: number(&lookup, ENV_NOTICE_CAPACITY, d.notice_capacity).max(1),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self { self.endpoint = endpoint.into(); self }
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.state_dir = dir.into(); self }
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self { self.http_timeout = timeout; self }
    pub fn with_dashboard_delay(mut self, delay: Duration) -> Self { self.dashboard_delay = delay; self }
    pub fn with_reset_redirect_delay(mut self, delay: Duration) -> Self { self.reset_redirect_delay = delay; self }
    pub fn with_notices(mut self, ttl: Duration, capacity: usize) -> Self {
        self.notice_ttl = ttl;
        self.notice_capacity = capacity.max(1);
        self
    }
}

fn number<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                warn!(target: "config", key, value = %raw, default, "ignoring unparseable setting");
                default
            }
        },
    }
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(target: "config", key, value = %raw, default_ms = default.as_millis() as u64, "ignoring unparseable setting");
                default
            }
        },
    }
}
