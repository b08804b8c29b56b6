//! Driver layer traits
//!
//! This module defines the abstract interface for one browser-automation
//! driver and the factory that builds them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::proxy::ProxyDescriptor;

/// Launch options for a new driver
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Headless mode (no visible window)
    pub headless: bool,
    /// Proxy the browser connects through; `None` means direct
    pub proxy: Option<ProxyDescriptor>,
    /// User agent string
    pub user_agent: String,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Chrome executable path
    pub chrome_path: Option<String>,
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            user_agent: String::new(),
            window_width: 1920,
            window_height: 1080,
            chrome_path: None,
        }
    }
}

/// Element selection strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
    /// Visible-text match on interactive elements
    Text(String),
}

impl Selector {
    /// Create a CSS selector
    pub fn css<S: Into<String>>(selector: S) -> Self {
        Selector::Css(selector.into())
    }

    /// Create an XPath selector
    pub fn xpath<S: Into<String>>(expression: S) -> Self {
        Selector::XPath(expression.into())
    }

    /// Create a visible-text selector
    pub fn text<S: Into<String>>(needle: S) -> Self {
        Selector::Text(needle.into())
    }

    /// Stable textual form, used for logging and by the mock driver
    pub fn describe(&self) -> String {
        match self {
            Selector::Css(s) => format!("css:{}", s),
            Selector::XPath(s) => format!("xpath:{}", s),
            Selector::Text(s) => format!("text:{}", s),
        }
    }
}

/// A named selector strategy.
///
/// Login and two-factor steps try a fixed, documented list of these in order,
/// so the element resolution stays deterministic and testable.
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    /// Strategy name, used in logs
    pub name: &'static str,
    /// The selector itself
    pub selector: Selector,
}

impl SelectorStrategy {
    /// Create a named strategy
    pub fn new(name: &'static str, selector: Selector) -> Self {
        Self { name, selector }
    }
}

/// Cookie as stored in auth material and replayed into drivers.
///
/// Field names serialize to the DevTools `Network.setCookie` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Cookie domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Cookie path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// HttpOnly flag
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// Create a cookie with just name and value
    pub fn new<S: Into<String>>(name: S, value: S) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    /// Set the domain
    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Element lookup result
#[derive(Debug, Clone, Deserialize)]
pub struct ElementInfo {
    /// Trimmed visible text of the element
    #[serde(default)]
    pub text: String,
    /// Whether the element occupies layout space
    #[serde(default)]
    pub visible: bool,
}

/// Navigation result
#[derive(Debug, Clone)]
pub struct NavigationResult {
    /// URL after navigation
    pub url: String,
    /// Whether the document reached the complete ready state within the bound
    pub loaded: bool,
}

/// JavaScript evaluation result
#[derive(Debug, Clone)]
pub enum EvaluationResult {
    /// String value
    String(String),
    /// Number value
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Null value
    Null,
    /// Object/Array (as JSON)
    Object(serde_json::Value),
}

/// Driver handle trait
///
/// Thin ownership wrapper around one underlying browser-automation driver
/// process/connection. The handle is an opaque resource with a lifetime: it
/// is exclusively owned by one session, and `quit` is the only way to release
/// the underlying process.
#[async_trait]
pub trait DriverHandle: Send + Sync + std::fmt::Debug {
    /// Get driver ID
    fn id(&self) -> &str;

    /// Whether this driver renders without a visible window
    fn is_headless(&self) -> bool;

    /// Whether the driver is still usable
    fn is_active(&self) -> bool;

    /// Navigate to a URL
    async fn navigate(&self, url: &str) -> Result<NavigationResult, crate::Error>;

    /// Get the current location
    async fn current_url(&self) -> Result<String, crate::Error>;

    /// Reload the current page
    async fn reload(&self) -> Result<(), crate::Error>;

    /// Evaluate JavaScript in the page
    async fn evaluate(&self, script: &str) -> Result<EvaluationResult, crate::Error>;

    /// Find a single element; `Ok(None)` when absent
    async fn find_element(&self, selector: &Selector) -> Result<Option<ElementInfo>, crate::Error>;

    /// Click an element
    async fn click(&self, selector: &Selector) -> Result<(), crate::Error>;

    /// Type text into an element
    async fn type_text(&self, selector: &Selector, text: &str) -> Result<(), crate::Error>;

    /// Get all cookies visible to the driver
    async fn cookies(&self) -> Result<Vec<Cookie>, crate::Error>;

    /// Set a single cookie
    async fn set_cookie(&self, cookie: &Cookie) -> Result<(), crate::Error>;

    /// Capture a screenshot (PNG bytes)
    async fn screenshot(&self) -> Result<Vec<u8>, crate::Error>;

    /// Quit the driver: graceful close, forced termination after the grace
    /// period. Idempotent.
    async fn quit(&self) -> Result<(), crate::Error>;
}

/// Driver factory trait
///
/// Builds driver handles. The registry and the visibility toggler only see
/// this seam, which is what lets tests substitute a scriptable mock.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Build a new driver for the given launch options
    async fn build(&self, spec: &LaunchSpec) -> Result<Arc<dyn DriverHandle>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_describe() {
        assert_eq!(Selector::css("#email").describe(), "css:#email");
        assert_eq!(Selector::text("Log in").describe(), "text:Log in");
        assert_eq!(Selector::xpath("//h1").describe(), "xpath://h1");
    }

    #[test]
    fn test_cookie_serde_camel_case() {
        let cookie = Cookie::new("c_user", "100001234").with_domain(".facebook.com");
        let json = serde_json::to_value(&cookie).unwrap();
        assert_eq!(json["name"], "c_user");
        assert_eq!(json["domain"], ".facebook.com");
        assert_eq!(json["httpOnly"], false);
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_cookie_deserialize_http_only() {
        let cookie: Cookie = serde_json::from_str(
            r#"{"name":"xs","value":"abc","domain":".facebook.com","path":"/","secure":true,"httpOnly":true}"#,
        )
        .unwrap();
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.path.as_deref(), Some("/"));
    }
}
