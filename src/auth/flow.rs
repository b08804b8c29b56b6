//! Authentication flow state machine
//!
//! Drives a fresh driver through cookie or credential+2FA login and reports a
//! classified outcome. Every failure path produces a typed result; nothing is
//! silently absorbed.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use crate::auth::material::{AuthMaterial, CookieJar, Credentials};
use crate::auth::selectors;
use crate::config::Config;
use crate::driver::{wait_for_any, DriverHandle, SelectorStrategy};
use crate::probe::{self, capture_diagnostic};
use crate::totp;
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Terminal login state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    /// The driver holds an authenticated session
    Authenticated,
    /// The account hit the checkpoint wall; not retried here
    CheckpointDetected,
    /// Cookies or credentials rejected; not retried here
    Dead,
}

/// Terminal outcome of one login attempt
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    /// Terminal state
    pub state: LoginState,
    /// Human-readable explanation
    pub message: String,
    /// Display name captured during verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    /// Base64 diagnostic screenshot on non-authenticated outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Authentication flow
pub struct AuthenticationFlow {
    config: Config,
}

impl AuthenticationFlow {
    /// Create a new flow
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full login state machine against a fresh driver.
    ///
    /// The driver is pointed at the landing page first; the material decides
    /// which path is taken. Transport and form-location failures return
    /// errors; site-side rejections return a classified outcome.
    pub async fn login(
        &self,
        driver: &dyn DriverHandle,
        material: &AuthMaterial,
    ) -> Result<LoginOutcome> {
        debug!("Starting {} login", material.kind());
        driver.navigate(&self.config.base_url).await?;

        match material {
            AuthMaterial::Cookies(jar) => self.login_with_cookies(driver, jar).await,
            AuthMaterial::Credentials(credentials) => {
                self.login_with_credentials(driver, credentials).await
            }
        }
    }

    /// Cookie path: inject the jar, reload, verify
    async fn login_with_cookies(
        &self,
        driver: &dyn DriverHandle,
        jar: &CookieJar,
    ) -> Result<LoginOutcome> {
        if jar.is_empty() {
            return Err(Error::authentication("Empty cookie jar"));
        }

        for cookie in jar {
            if let Err(e) = driver.set_cookie(cookie).await {
                warn!("Cookie {} failed to apply: {}", cookie.name, e);
            }
        }

        driver.reload().await?;
        self.verify(driver).await
    }

    /// Credential path: fill the form, submit, handle the 2FA prompt, verify
    async fn login_with_credentials(
        &self,
        driver: &dyn DriverHandle,
        credentials: &Credentials,
    ) -> Result<LoginOutcome> {
        let fields = selectors::identifier_fields();
        let field = self
            .resolve(driver, &fields, "identifier field")
            .await?;
        driver
            .type_text(&field.selector, &credentials.identifier)
            .await?;
        pause_briefly().await;

        let fields = selectors::secret_fields();
        let field = self.resolve(driver, &fields, "password field").await?;
        driver.type_text(&field.selector, &credentials.secret).await?;
        pause_briefly().await;

        let controls = selectors::submit_controls();
        let control = self.resolve(driver, &controls, "login control").await?;
        driver.click(&control.selector).await?;

        tokio::time::sleep(self.config.login_wait()).await;

        let prompts = selectors::two_factor_fields();
        if let Some((index, _)) =
            wait_for_any(driver, &prompts, self.config.login_wait()).await?
        {
            let prompt = &prompts[index];
            info!("Two-factor prompt detected via {}", prompt.name);

            let seed = credentials
                .totp_seed
                .as_deref()
                .ok_or_else(|| Error::authentication("2fa required, no seed"))?;
            let code = totp::generate_now(seed)?;

            driver.type_text(&prompt.selector, &code).await?;
            pause_briefly().await;

            let controls = selectors::two_factor_submit();
            let control = self
                .resolve(driver, &controls, "two-factor submit control")
                .await?;
            driver.click(&control.selector).await?;

            tokio::time::sleep(self.config.two_factor_wait()).await;
        }

        self.verify(driver).await
    }

    /// Resolve the first matching strategy within the login wait bound
    async fn resolve<'a>(
        &self,
        driver: &dyn DriverHandle,
        strategies: &'a [SelectorStrategy],
        what: &str,
    ) -> Result<&'a SelectorStrategy> {
        match wait_for_any(driver, strategies, self.config.login_wait()).await? {
            Some((index, _)) => {
                let strategy = &strategies[index];
                debug!("Resolved {} via {}", what, strategy.name);
                Ok(strategy)
            }
            None => Err(Error::authentication(format!("{} not found", what))),
        }
    }

    /// Shared verification: navigate to the profile location and classify
    async fn verify(&self, driver: &dyn DriverHandle) -> Result<LoginOutcome> {
        let location = driver.navigate(&self.config.profile_url()).await?.url;

        if probe::is_checkpoint_url(&location) {
            return Ok(LoginOutcome {
                state: LoginState::CheckpointDetected,
                message: "Account in checkpoint".to_string(),
                account_name: None,
                screenshot: capture_diagnostic(driver).await,
            });
        }

        if probe::is_login_url(&location) {
            return Ok(LoginOutcome {
                state: LoginState::Dead,
                message: "Credentials or cookies rejected".to_string(),
                account_name: None,
                screenshot: capture_diagnostic(driver).await,
            });
        }

        match wait_for_any(
            driver,
            &probe::profile_name_fields(),
            self.config.probe_wait(),
        )
        .await?
        {
            Some((_, element)) => {
                let name = element.text.trim().to_string();
                let message = if name.is_empty() {
                    "Authenticated".to_string()
                } else {
                    format!("Authenticated as {}", name)
                };
                Ok(LoginOutcome {
                    state: LoginState::Authenticated,
                    message,
                    account_name: (!name.is_empty()).then_some(name),
                    screenshot: None,
                })
            }
            None => Ok(LoginOutcome {
                state: LoginState::Dead,
                message: "Could not confirm authenticated state".to_string(),
                account_name: None,
                screenshot: capture_diagnostic(driver).await,
            }),
        }
    }
}

/// Small randomized pause between form interactions
async fn pause_briefly() {
    let jitter = rand::thread_rng().gen_range(120..360);
    tokio::time::sleep(Duration::from_millis(jitter)).await;
}
