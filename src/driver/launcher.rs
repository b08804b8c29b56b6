//! Chrome launcher and driver factory
//!
//! Spawns one Chrome process per driver with the automation-concealment
//! launch profile, discovers its DevTools endpoint, and wires up the typed
//! client. This is the production [`DriverFactory`]; tests substitute the
//! scriptable mock instead.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::CdpClient;
use super::connection::CdpConnection;
use super::handle::CdpDriverHandle;
use super::traits::{DriverFactory, DriverHandle, LaunchSpec};
use crate::config::Config;
use crate::{Error, Result};

/// Script evaluated on every new document to hide the automation flag
const CONCEAL_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Chrome-backed driver factory
pub struct ChromeDriverFactory {
    config: Config,
}

impl ChromeDriverFactory {
    /// Create a new factory
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Spawn the Chrome process for a launch spec
    fn spawn_browser(&self, spec: &LaunchSpec, id: &str, port: u16) -> Result<Child> {
        let binary = spec
            .chrome_path
            .clone()
            .or_else(|| self.config.chrome_path.clone())
            .unwrap_or_else(|| default_chrome_binary().to_string());

        let user_data_dir = std::env::temp_dir().join(format!("warden-profile-{}", id));

        let mut cmd = Command::new(&binary);
        if spec.headless {
            cmd.arg("--headless=new");
        }
        cmd.arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!(
                "--window-size={},{}",
                spec.window_width, spec.window_height
            ))
            .arg(format!("--remote-debugging-port={}", port))
            .arg(format!("--user-data-dir={}", user_data_dir.display()));

        if !spec.user_agent.is_empty() {
            cmd.arg(format!("--user-agent={}", spec.user_agent));
        }

        if let Some(proxy) = &spec.proxy {
            cmd.arg(format!("--proxy-server={}", proxy.server_arg()));
        }

        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        // Safety net; normal teardown goes through DriverHandle::quit
        cmd.kill_on_drop(true);

        debug!("Launching {} on DevTools port {}", binary, port);

        cmd.spawn()
            .map_err(|e| Error::internal(format!("Failed to launch Chrome ({}): {}", binary, e)))
    }

    /// Wait for the DevTools endpoint, open a page target and attach a client
    async fn attach(&self, http_endpoint: &str, spec: &LaunchSpec) -> Result<(Arc<CdpConnection>, CdpClient)> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        // The endpoint takes a moment to come up after the process starts
        let version_url = format!("{}/json/version", http_endpoint);
        let mut endpoint_up = false;
        for _ in 0..50 {
            if http.get(&version_url).send().await.is_ok() {
                endpoint_up = true;
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        }
        if !endpoint_up {
            return Err(Error::timeout(format!(
                "DevTools endpoint {} never came up",
                http_endpoint
            )));
        }

        // Create a fresh page target and take its WebSocket URL
        let new_url = format!("{}/json/new?about:blank", http_endpoint);
        let target: serde_json::Value = http
            .put(&new_url)
            .send()
            .await
            .map_err(|e| Error::internal(format!("Failed to create target: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::internal(format!("Failed to parse target response: {}", e)))?;

        let ws_url = target
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::internal("No webSocketDebuggerUrl in target response"))?;

        let connection = CdpConnection::connect(ws_url).await?;
        let client = CdpClient::new(Arc::clone(&connection));

        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;
        client.enable_domain("Network").await?;

        // UA override must land before the first navigation
        if !spec.user_agent.is_empty() {
            client
                .call_method(
                    "Network.setUserAgentOverride",
                    serde_json::json!({ "userAgent": spec.user_agent }),
                )
                .await?;
        }

        client
            .call_method(
                "Page.addScriptToEvaluateOnNewDocument",
                serde_json::json!({ "source": CONCEAL_WEBDRIVER_SCRIPT }),
            )
            .await?;

        Ok((connection, client))
    }
}

#[async_trait]
impl DriverFactory for ChromeDriverFactory {
    async fn build(&self, spec: &LaunchSpec) -> Result<Arc<dyn DriverHandle>> {
        let id = Uuid::new_v4().to_string();
        let port = free_port()?;

        info!(
            "Building driver {} (headless={}, proxy={})",
            id,
            spec.headless,
            spec.proxy
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "direct".to_string())
        );

        let mut child = self.spawn_browser(spec, &id, port)?;
        let http_endpoint = format!("http://127.0.0.1:{}", port);

        match self.attach(&http_endpoint, spec).await {
            Ok((connection, client)) => Ok(Arc::new(CdpDriverHandle::new(
                id,
                spec.headless,
                client,
                connection,
                Some(child),
                self.config.quit_grace(),
                self.config.nav_timeout(),
            ))),
            Err(e) => {
                warn!("Driver {} attach failed, reaping process: {}", id, e);
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to reap Chrome process: {}", kill_err);
                }
                Err(e)
            }
        }
    }
}

/// Pick a free loopback port for the DevTools endpoint
fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Platform default Chrome binary
fn default_chrome_binary() -> &'static str {
    if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else if cfg!(target_os = "windows") {
        "chrome.exe"
    } else {
        "google-chrome"
    }
}
