//! Account status probe
//!
//! Classifies an authenticated session from observable signals only: the
//! location the profile navigation lands at, and whether a profile-name
//! element appears within the bounded wait. Non-live outcomes carry a
//! diagnostic screenshot so an operator can see what the driver rendered.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::driver::{wait_for_any, DriverHandle, Selector, SelectorStrategy};
use crate::session::Session;
use crate::Result;
use tracing::{info, warn};

/// URL fragment that marks the checkpoint wall
pub const CHECKPOINT_URL_MARKER: &str = "checkpoint";

/// URL fragment that marks the login/auth wall
pub const LOGIN_URL_MARKER: &str = "login";

/// Whether a location is behind the checkpoint wall
pub fn is_checkpoint_url(url: &str) -> bool {
    url.contains(CHECKPOINT_URL_MARKER)
}

/// Whether a location was redirected to the login wall
pub fn is_login_url(url: &str) -> bool {
    url.contains(LOGIN_URL_MARKER)
}

/// Strategies that resolve the profile display name
pub fn profile_name_fields() -> Vec<SelectorStrategy> {
    vec![
        SelectorStrategy::new("profile-heading", Selector::css("h1")),
        SelectorStrategy::new("profile-heading-span", Selector::css("h1 span")),
    ]
}

/// Capture a screenshot for diagnostics, base64-encoded for transport.
///
/// Best-effort: a failed capture is logged, never fatal.
pub async fn capture_diagnostic(driver: &dyn DriverHandle) -> Option<String> {
    match driver.screenshot().await {
        Ok(bytes) => Some(BASE64.encode(bytes)),
        Err(e) => {
            warn!("Diagnostic screenshot failed: {}", e);
            None
        }
    }
}

/// Probe classification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    /// Account is usable; display name captured when available
    Live,
    /// Account flagged for manual verification
    Checkpoint,
    /// Cookies/credentials rejected, redirected to the auth wall
    Dead,
    /// No decisive signal within the bound
    Unknown,
    /// Transport/navigation failure while probing
    ProbeError,
}

/// Full probe report handed to the API layer
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Classified state
    pub state: AccountState,
    /// Human-readable explanation
    pub message: String,
    /// Extracted display name, on live accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    /// Base64 screenshot, attached on non-live and ambiguous outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl ProbeReport {
    fn new<S: Into<String>>(state: AccountState, message: S) -> Self {
        Self {
            state,
            message: message.into(),
            account_name: None,
            screenshot: None,
        }
    }
}

/// Account status probe
pub struct AccountStatusProbe {
    config: Config,
}

impl AccountStatusProbe {
    /// Create a new probe
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Classify a registered session.
    ///
    /// Takes the session's operation slot for the duration of the probe; a
    /// concurrent operation gets a busy rejection instead of sharing the
    /// driver.
    pub async fn classify(&self, session: &Session) -> Result<ProbeReport> {
        let _guard = session.begin_operation()?;
        let driver = session.driver()?;
        let report = self.inspect(driver.as_ref()).await;
        session.touch();
        info!(
            "Session {} classified as {:?}: {}",
            session.key(),
            report.state,
            report.message
        );
        Ok(report)
    }

    /// Classify directly from a driver.
    ///
    /// Signals are evaluated in precedence order: checkpoint location, login
    /// location, profile-name element, wait expiry. Transport failures map to
    /// `ProbeError`.
    pub async fn inspect(&self, driver: &dyn DriverHandle) -> ProbeReport {
        let location = match driver.navigate(&self.config.profile_url()).await {
            Ok(nav) => nav.url,
            Err(e) => {
                let mut report = ProbeReport::new(AccountState::ProbeError, e.to_string());
                report.screenshot = capture_diagnostic(driver).await;
                return report;
            }
        };

        if is_checkpoint_url(&location) {
            let mut report = ProbeReport::new(AccountState::Checkpoint, "Account in checkpoint");
            report.screenshot = capture_diagnostic(driver).await;
            return report;
        }

        if is_login_url(&location) {
            let mut report = ProbeReport::new(
                AccountState::Dead,
                "Account cookies expired or invalid",
            );
            report.screenshot = capture_diagnostic(driver).await;
            return report;
        }

        match wait_for_any(driver, &profile_name_fields(), self.config.probe_wait()).await {
            Ok(Some((_, element))) => {
                let name = element.text.trim().to_string();
                let mut report = ProbeReport::new(
                    AccountState::Live,
                    format!("Account is active: {}", name),
                );
                report.account_name = (!name.is_empty()).then_some(name);
                report
            }
            Ok(None) => {
                let mut report = ProbeReport::new(
                    AccountState::Unknown,
                    "Could not determine account status",
                );
                report.screenshot = capture_diagnostic(driver).await;
                report
            }
            Err(e) => {
                let mut report = ProbeReport::new(AccountState::ProbeError, e.to_string());
                report.screenshot = capture_diagnostic(driver).await;
                report
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, Selector};

    fn probe() -> AccountStatusProbe {
        let config = Config {
            probe_wait_ms: 200,
            ..Config::default()
        };
        AccountStatusProbe::new(config)
    }

    #[tokio::test]
    async fn test_checkpoint_location_wins() {
        let driver = MockDriver::new(true);
        driver.redirect(
            "https://www.facebook.com/me",
            "https://www.facebook.com/checkpoint/828281883",
        );
        // Name element present, but the checkpoint location takes precedence
        driver.insert_element(&Selector::css("h1"), "Nguyen Van A");

        let report = probe().inspect(&driver).await;
        assert_eq!(report.state, AccountState::Checkpoint);
        assert!(report.screenshot.is_some());
    }

    #[tokio::test]
    async fn test_login_redirect_is_dead() {
        let driver = MockDriver::new(true);
        driver.redirect(
            "https://www.facebook.com/me",
            "https://www.facebook.com/login.php?next=%2Fme",
        );

        let report = probe().inspect(&driver).await;
        assert_eq!(report.state, AccountState::Dead);
        assert!(report.screenshot.is_some());
        assert!(report.account_name.is_none());
    }

    #[tokio::test]
    async fn test_live_account_captures_name() {
        let driver = MockDriver::new(true);
        driver.insert_element(&Selector::css("h1"), "Nguyen Van A");

        let report = probe().inspect(&driver).await;
        assert_eq!(report.state, AccountState::Live);
        assert_eq!(report.account_name.as_deref(), Some("Nguyen Van A"));
        // No screenshot cost on live accounts
        assert!(report.screenshot.is_none());
    }

    #[tokio::test]
    async fn test_no_signal_is_unknown() {
        let driver = MockDriver::new(true);

        let report = probe().inspect(&driver).await;
        assert_eq!(report.state, AccountState::Unknown);
        assert!(report.screenshot.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_is_probe_error() {
        let driver = MockDriver::new(true);
        driver.set_fail_navigation(true);

        let report = probe().inspect(&driver).await;
        assert_eq!(report.state, AccountState::ProbeError);
        assert!(report.message.contains("Navigation"));
    }

    #[test]
    fn test_url_markers() {
        assert!(is_checkpoint_url("https://www.facebook.com/checkpoint/x"));
        assert!(is_login_url("https://www.facebook.com/login.php"));
        assert!(!is_checkpoint_url("https://www.facebook.com/me"));
        assert!(!is_login_url("https://www.facebook.com/me"));
    }
}
