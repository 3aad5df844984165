//! Command-line configuration
//!
//! Settings come from a TOML file, then environment overrides:
//! - `HOMENOTE_API_URL` replaces `api_url`
//! - `HOMENOTE_STATE_DIR` replaces `state_dir`
//!
//! Command-line flags are applied last by the caller.

use anyhow::{Context, Result};
use homenote_client::ClientConfig;
use homenote_sse::{ReconnectPolicy, SseConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_URL_VAR: &str = "HOMENOTE_API_URL";
pub const STATE_DIR_VAR: &str = "HOMENOTE_STATE_DIR";

/// File holding the persisted session
pub const SESSION_FILE: &str = "session.json";

/// Event stream reconnect settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Delay before the first reconnect
    pub reconnect_delay_secs: u64,
    /// Upper bound for backoff; equal to the first delay for a flat policy
    pub max_delay_secs: u64,
    /// Give up after this many consecutive failures
    pub max_attempts: Option<u32>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 3,
            max_delay_secs: 3,
            max_attempts: None,
        }
    }
}

impl EventsConfig {
    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_secs(self.reconnect_delay_secs);
        let policy = if self.max_delay_secs > self.reconnect_delay_secs {
            ReconnectPolicy::exponential(initial, Duration::from_secs(self.max_delay_secs))
        } else {
            ReconnectPolicy::fixed(initial)
        };
        match self.max_attempts {
            Some(attempts) => policy.with_max_attempts(attempts),
            None => policy,
        }
    }
}

/// Top-level configuration for the `homenote` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend origin
    pub api_url: String,
    /// Directory for the session file
    pub state_dir: PathBuf,
    /// Deadline for buffered requests
    pub request_timeout_secs: u64,
    pub events: EventsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: ClientConfig::default().base_url,
            state_dir: PathBuf::from(".homenote"),
            request_timeout_secs: 30,
            events: EventsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from `path`
    ///
    /// A missing file yields the default configuration.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides from the process environment
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides read through `lookup`
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(API_URL_VAR).filter(|v| !v.trim().is_empty()) {
            Some(url) => {
                tracing::info!("{} set, using API at {}", API_URL_VAR, url);
                self.api_url = url;
            }
            None => tracing::debug!("{} not set, using {}", API_URL_VAR, self.api_url),
        }

        match lookup(STATE_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => {
                tracing::info!("{} set, keeping state in {}", STATE_DIR_VAR, dir);
                self.state_dir = PathBuf::from(dir);
            }
            None => tracing::debug!(
                "{} not set, using {}",
                STATE_DIR_VAR,
                self.state_dir.display()
            ),
        }

        if self.request_timeout_secs == 0 {
            tracing::warn!("request_timeout_secs is 0, falling back to 30");
            self.request_timeout_secs = 30;
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_user_agent(format!("homenote-cli/{}", crate::VERSION))
    }

    #[must_use]
    pub fn sse_config(&self) -> SseConfig {
        SseConfig::new().with_reconnect(self.events.policy())
    }

    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.events.policy(), ReconnectPolicy::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homenote.toml");
        std::fs::write(
            &path,
            "api_url = \"http://localhost:8080\"\n\n[events]\nmax_delay_secs = 60\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(
            config.events.policy(),
            ReconnectPolicy::exponential(Duration::from_secs(3), Duration::from_secs(60))
                .with_max_attempts(5)
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homenote.toml");
        std::fs::write(&path, "api_url = [").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (API_URL_VAR, "https://staging.homenote.test"),
            (STATE_DIR_VAR, "/tmp/homenote"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default()
            .with_overrides(|name| env.get(name).map(|v| (*v).to_string()));
        assert_eq!(config.api_url, "https://staging.homenote.test");
        assert_eq!(config.session_path(), PathBuf::from("/tmp/homenote/session.json"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = AppConfig::default().with_overrides(|_| Some("  ".to_string()));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn client_config_uses_timeout() {
        let mut config = AppConfig::default().with_api_url("http://localhost:8080/");
        config.request_timeout_secs = 5;

        let client = config.client_config();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.request_timeout, Duration::from_secs(5));
        assert!(client.user_agent.starts_with("homenote-cli/"));
    }
}
