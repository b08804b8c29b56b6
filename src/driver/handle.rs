//! DevTools-backed driver handle
//!
//! Owns one Chrome child process plus its DevTools connection and implements
//! the [`DriverHandle`] contract on top of the typed client. Element lookup,
//! clicking and typing are built from evaluated page scripts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::CdpClient;
use super::connection::CdpConnection;
use super::traits::{Cookie, DriverHandle, ElementInfo, EvaluationResult, NavigationResult, Selector};
use crate::Error;

/// DevTools-backed driver handle
#[derive(Debug)]
pub struct CdpDriverHandle {
    /// Driver ID
    id: String,
    /// Headless flag this driver was launched with
    headless: bool,
    /// Typed DevTools client
    client: CdpClient,
    /// Underlying connection (closed during quit)
    connection: Arc<CdpConnection>,
    /// Owned browser process; `None` when attached to an external browser
    child: Mutex<Option<Child>>,
    /// Grace period before the process kill is forced
    quit_grace: Duration,
    /// Navigation readiness bound
    nav_timeout: Duration,
    /// Cleared exactly once by quit
    active: AtomicBool,
}

impl CdpDriverHandle {
    /// Create a new handle over an established client and owned process
    pub fn new(
        id: String,
        headless: bool,
        client: CdpClient,
        connection: Arc<CdpConnection>,
        child: Option<Child>,
        quit_grace: Duration,
        nav_timeout: Duration,
    ) -> Self {
        Self {
            id,
            headless,
            client,
            connection,
            child: Mutex::new(child),
            quit_grace,
            nav_timeout,
            active: AtomicBool::new(true),
        }
    }

    /// JS expression that resolves the selector to an element (or null)
    fn locate_js(selector: &Selector) -> String {
        match selector {
            Selector::Css(css) => format!("document.querySelector({})", js_string(css)),
            Selector::XPath(xpath) => format!(
                "document.evaluate({}, document, null, \
                 XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_string(xpath)
            ),
            Selector::Text(needle) => format!(
                "Array.from(document.querySelectorAll(\
                 'a,button,span,div[role=\"button\"],input[type=\"submit\"]'))\
                 .find(el => (el.innerText || '').trim().includes({}))",
                js_string(needle)
            ),
        }
    }
}

/// Quote a Rust string as a JS string literal
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

#[async_trait]
impl DriverHandle for CdpDriverHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_headless(&self) -> bool {
        self.headless
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.connection.is_active()
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        self.client.navigate(url, self.nav_timeout).await
    }

    async fn current_url(&self) -> Result<String, Error> {
        match self.client.evaluate("window.location.href", false).await? {
            EvaluationResult::String(href) => Ok(href),
            other => Err(Error::cdp(format!(
                "Unexpected location result: {:?}",
                other
            ))),
        }
    }

    async fn reload(&self) -> Result<(), Error> {
        self.client.reload().await
    }

    async fn evaluate(&self, script: &str) -> Result<EvaluationResult, Error> {
        self.client.evaluate(script, true).await
    }

    async fn find_element(&self, selector: &Selector) -> Result<Option<ElementInfo>, Error> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return \"null\"; \
             return JSON.stringify({{ \
             text: (el.innerText || el.textContent || '').trim(), \
             visible: !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length) \
             }}); }})()",
            Self::locate_js(selector)
        );

        match self.client.evaluate(&script, false).await? {
            EvaluationResult::String(payload) if payload == "null" => Ok(None),
            EvaluationResult::String(payload) => {
                let info: ElementInfo = serde_json::from_str(&payload)?;
                Ok(Some(info))
            }
            other => Err(Error::cdp(format!(
                "Unexpected element lookup result: {:?}",
                other
            ))),
        }
    }

    async fn click(&self, selector: &Selector) -> Result<(), Error> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            Self::locate_js(selector)
        );

        match self.client.evaluate(&script, false).await? {
            EvaluationResult::Bool(true) => Ok(()),
            EvaluationResult::Bool(false) => Err(Error::element_not_found(selector.describe())),
            other => Err(Error::cdp(format!("Unexpected click result: {:?}", other))),
        }
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> Result<(), Error> {
        let script = format!(
            "(() => {{ \
             const el = {}; \
             if (!el) return false; \
             el.focus(); \
             const value = {}; \
             if (el.isContentEditable) {{ el.textContent = value; }} \
             else {{ \
               const proto = el instanceof HTMLTextAreaElement \
                 ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
               const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
               if (desc && desc.set) {{ desc.set.call(el, value); }} else {{ el.value = value; }} \
             }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            Self::locate_js(selector),
            js_string(text)
        );

        match self.client.evaluate(&script, false).await? {
            EvaluationResult::Bool(true) => Ok(()),
            EvaluationResult::Bool(false) => Err(Error::element_not_found(selector.describe())),
            other => Err(Error::cdp(format!("Unexpected type result: {:?}", other))),
        }
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, Error> {
        self.client.cookies().await
    }

    async fn set_cookie(&self, cookie: &Cookie) -> Result<(), Error> {
        let fallback = if cookie.domain.is_none() {
            self.current_url()
                .await
                .unwrap_or_else(|_| "about:blank".to_string())
        } else {
            String::new()
        };
        self.client.set_cookie(cookie, &fallback).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, Error> {
        self.client.screenshot().await
    }

    async fn quit(&self) -> Result<(), Error> {
        if !self.active.swap(false, Ordering::SeqCst) {
            debug!("Driver {} already quit", self.id);
            return Ok(());
        }

        info!("Quitting driver {}", self.id);

        // Graceful path first: ask the browser to close itself
        match tokio::time::timeout(
            self.quit_grace,
            self.client.call_method("Browser.close", serde_json::json!({})),
        )
        .await
        {
            Ok(Ok(_)) => debug!("Driver {} closed gracefully", self.id),
            Ok(Err(e)) => warn!("Driver {} graceful close failed: {}", self.id, e),
            Err(_) => warn!(
                "Driver {} graceful close timed out after {:?}",
                self.id, self.quit_grace
            ),
        }

        if let Err(e) = self.connection.close().await {
            debug!("Driver {} connection close: {}", self.id, e);
        }

        let mut child_guard = self.child.lock().await;
        if let Some(child) = child_guard.as_mut() {
            match tokio::time::timeout(self.quit_grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("Driver {} process exited: {}", self.id, status);
                }
                Ok(Err(e)) => {
                    warn!("Driver {} process wait failed: {}", self.id, e);
                }
                Err(_) => {
                    warn!(
                        "Driver {} process still alive after {:?}, forcing kill",
                        self.id, self.quit_grace
                    );
                    child.kill().await.map_err(|e| {
                        Error::resource_teardown(format!(
                            "Driver {} could not be killed: {}",
                            self.id, e
                        ))
                    })?;
                }
            }
        }
        *child_guard = None;

        info!("Driver {} released", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_js_css() {
        let js = CdpDriverHandle::locate_js(&Selector::css("#email"));
        assert_eq!(js, "document.querySelector(\"#email\")");
    }

    #[test]
    fn test_locate_js_escapes_quotes() {
        let js = CdpDriverHandle::locate_js(&Selector::css("input[name=\"login\"]"));
        assert!(js.contains("\\\"login\\\""));
    }

    #[test]
    fn test_locate_js_text() {
        let js = CdpDriverHandle::locate_js(&Selector::text("Log in"));
        assert!(js.contains("includes(\"Log in\")"));
    }
}
