//! Configuration management for Warden-Oxide

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Session core configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Target site root (landing page, cookie injection origin)
    pub base_url: String,

    /// Path of the canonical "my profile" location, relative to `base_url`
    pub profile_path: String,

    /// Chrome executable path
    pub chrome_path: Option<String>,

    /// User agent applied to every driver
    pub user_agent: String,

    /// Browser window width
    pub window_width: u32,

    /// Browser window height
    pub window_height: u32,

    /// Navigation timeout in milliseconds
    pub nav_timeout_ms: u64,

    /// Wait after submitting the login form, in milliseconds
    pub login_wait_ms: u64,

    /// Wait after submitting a two-factor code, in milliseconds
    pub two_factor_wait_ms: u64,

    /// Bounded wait for the probe's decisive signal, in milliseconds
    pub probe_wait_ms: u64,

    /// Grace period before a hung driver quit is forced, in milliseconds
    pub quit_grace_ms: u64,

    /// Maximum concurrent sessions
    pub max_sessions: usize,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.facebook.com".to_string(),
            profile_path: "/me".to_string(),
            chrome_path: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            window_width: 1920,
            window_height: 1080,
            nav_timeout_ms: 30000,
            login_wait_ms: 3000,
            two_factor_wait_ms: 5000,
            probe_wait_ms: 10000,
            quit_grace_ms: 3000,
            max_sessions: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(base_url) = env::var("WARDEN_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(profile_path) = env::var("WARDEN_PROFILE_PATH") {
            config.profile_path = profile_path;
        }

        if let Ok(chrome_path) = env::var("WARDEN_CHROME_PATH") {
            config.chrome_path = Some(chrome_path);
        }

        if let Ok(user_agent) = env::var("WARDEN_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Ok(nav_timeout) = env::var("WARDEN_NAV_TIMEOUT") {
            config.nav_timeout_ms = nav_timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid WARDEN_NAV_TIMEOUT"))?;
        }

        if let Ok(login_wait) = env::var("WARDEN_LOGIN_WAIT") {
            config.login_wait_ms = login_wait
                .parse()
                .map_err(|_| Error::configuration("Invalid WARDEN_LOGIN_WAIT"))?;
        }

        if let Ok(two_factor_wait) = env::var("WARDEN_TWO_FACTOR_WAIT") {
            config.two_factor_wait_ms = two_factor_wait
                .parse()
                .map_err(|_| Error::configuration("Invalid WARDEN_TWO_FACTOR_WAIT"))?;
        }

        if let Ok(probe_wait) = env::var("WARDEN_PROBE_WAIT") {
            config.probe_wait_ms = probe_wait
                .parse()
                .map_err(|_| Error::configuration("Invalid WARDEN_PROBE_WAIT"))?;
        }

        if let Ok(quit_grace) = env::var("WARDEN_QUIT_GRACE") {
            config.quit_grace_ms = quit_grace
                .parse()
                .map_err(|_| Error::configuration("Invalid WARDEN_QUIT_GRACE"))?;
        }

        if let Ok(max_sessions) = env::var("WARDEN_MAX_SESSIONS") {
            config.max_sessions = max_sessions
                .parse()
                .map_err(|_| Error::configuration("Invalid WARDEN_MAX_SESSIONS"))?;
        }

        if let Ok(log_level) = env::var("WARDEN_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Full URL of the profile location used by the status probe
    pub fn profile_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.profile_path
        )
    }

    /// Navigation timeout as a `Duration`
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }

    /// Post-login wait as a `Duration`
    pub fn login_wait(&self) -> Duration {
        Duration::from_millis(self.login_wait_ms)
    }

    /// Post-2FA wait as a `Duration`
    pub fn two_factor_wait(&self) -> Duration {
        Duration::from_millis(self.two_factor_wait_ms)
    }

    /// Probe signal wait as a `Duration`
    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }

    /// Teardown grace period as a `Duration`
    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }
}
