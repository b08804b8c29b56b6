//! Typed DevTools client
//!
//! High-level wrapper over one [`CdpConnection`] providing the operations the
//! driver handle needs: navigation, script evaluation, cookies, screenshots.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use super::connection::CdpConnection;
use super::traits::{Cookie, EvaluationResult, NavigationResult};
use super::types::{EvaluateParams, EvaluateResponse, GetAllCookiesResponse, NavigateParams, RemoteObject};
use crate::Error;

/// Typed DevTools client
#[derive(Debug, Clone)]
pub struct CdpClient {
    /// Underlying connection
    connection: Arc<CdpConnection>,
}

impl CdpClient {
    /// Create a new client over an established connection
    pub fn new(connection: Arc<CdpConnection>) -> Self {
        Self { connection }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> Arc<CdpConnection> {
        Arc::clone(&self.connection)
    }

    /// Navigate to a URL and wait for the document to become ready.
    ///
    /// Waits by polling `document.readyState` up to `nav_timeout`; an
    /// incomplete load within the bound is reported, not fatal.
    pub async fn navigate(
        &self,
        url: &str,
        nav_timeout: std::time::Duration,
    ) -> Result<NavigationResult, Error> {
        debug!("Navigating to {}", url);

        let params = NavigateParams {
            url: url.to_string(),
        };
        let result = self
            .call_method("Page.navigate", serde_json::to_value(params)?)
            .await?;

        // Chrome reports connection-level failures in errorText
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            if !error_text.is_empty() {
                if error_text.contains("PROXY") || error_text.contains("TUNNEL") {
                    return Err(Error::proxy(format!(
                        "Navigation to {} failed: {}",
                        url, error_text
                    )));
                }
                return Err(Error::navigation_failed(format!(
                    "Navigation to {} failed: {}",
                    url, error_text
                )));
            }
        }

        let poll_interval = tokio::time::Duration::from_millis(100);
        let deadline = tokio::time::Instant::now() + nav_timeout;
        let mut loaded = false;

        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(poll_interval).await;

            match self.evaluate("document.readyState", false).await {
                Ok(EvaluationResult::String(state)) if state == "complete" => {
                    loaded = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    // Page might be mid-transition, keep polling
                    debug!("readyState check failed, continuing: {}", e);
                }
            }
        }

        if !loaded {
            debug!("Page load polling expired for {} - continuing anyway", url);
        }

        let final_url = match self.evaluate("window.location.href", false).await {
            Ok(EvaluationResult::String(href)) => href,
            _ => url.to_string(),
        };

        Ok(NavigationResult {
            url: final_url,
            loaded,
        })
    }

    /// Evaluate JavaScript in the page
    pub async fn evaluate(
        &self,
        script: &str,
        await_promise: bool,
    ) -> Result<EvaluationResult, Error> {
        let params = EvaluateParams {
            expression: script.to_string(),
            await_promise: Some(await_promise),
            return_by_value: Some(true),
        };

        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            return Err(Error::cdp(format!(
                "Script failed: {}",
                exception
                    .get("exception")
                    .and_then(|e| e.get("description"))
                    .and_then(|d| d.as_str())
                    .unwrap_or("Unknown error")
            )));
        }

        let response: EvaluateResponse = serde_json::from_value(result)?;
        Self::parse_remote_object(&response.result)
    }

    /// Capture a PNG screenshot
    pub async fn screenshot(&self) -> Result<Vec<u8>, Error> {
        let result = self
            .call_method(
                "Page.captureScreenshot",
                serde_json::json!({ "format": "png" }),
            )
            .await?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No data in screenshot response"))?;

        BASE64
            .decode(data)
            .map_err(|e| Error::cdp(format!("Invalid screenshot payload: {}", e)))
    }

    /// Get all cookies known to the browser
    pub async fn cookies(&self) -> Result<Vec<Cookie>, Error> {
        let result = self
            .call_method("Network.getAllCookies", serde_json::json!({}))
            .await?;

        let parsed: GetAllCookiesResponse = serde_json::from_value(result)?;
        Ok(parsed.cookies.into_iter().map(Cookie::from).collect())
    }

    /// Set a single cookie.
    ///
    /// `fallback_url` scopes cookies that carry no explicit domain.
    pub async fn set_cookie(&self, cookie: &Cookie, fallback_url: &str) -> Result<(), Error> {
        let mut params = serde_json::to_value(cookie)?;
        if cookie.domain.is_none() {
            params["url"] = serde_json::Value::String(fallback_url.to_string());
        }

        let result = self.call_method("Network.setCookie", params).await?;

        let accepted = result
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if !accepted {
            return Err(Error::cdp(format!("Cookie {} rejected by browser", cookie.name)));
        }

        Ok(())
    }

    /// Reload the current page
    pub async fn reload(&self) -> Result<(), Error> {
        self.call_method("Page.reload", serde_json::json!({ "ignoreCache": false }))
            .await?;
        Ok(())
    }

    /// Enable a protocol domain
    pub async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        self.call_method(&format!("{}.enable", domain), serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Call a raw CDP method (returns JSON Value)
    pub async fn call_method(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        self.connection.send_command(method, params).await
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> Result<EvaluationResult, Error> {
        match obj.r#type.as_str() {
            "string" => Ok(EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            )),
            "number" => Ok(EvaluationResult::Number(
                obj.value.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0),
            )),
            "boolean" => Ok(EvaluationResult::Bool(
                obj.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            )),
            "undefined" => Ok(EvaluationResult::Null),
            "object" if obj.subtype.as_deref() == Some("null") => Ok(EvaluationResult::Null),
            "object" | "function" | "bigint" | "symbol" => Ok(EvaluationResult::Object(
                obj.value.clone().unwrap_or(serde_json::Value::Null),
            )),
            _ => Ok(EvaluationResult::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_object_string() {
        let obj = RemoteObject {
            r#type: "string".to_string(),
            value: Some(serde_json::json!("hello")),
            ..Default::default()
        };
        match CdpClient::parse_remote_object(&obj).unwrap() {
            EvaluationResult::String(s) => assert_eq!(s, "hello"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_remote_object_null_subtype() {
        let obj = RemoteObject {
            r#type: "object".to_string(),
            subtype: Some("null".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            CdpClient::parse_remote_object(&obj).unwrap(),
            EvaluationResult::Null
        ));
    }

    #[test]
    fn test_parse_remote_object_bool() {
        let obj = RemoteObject {
            r#type: "boolean".to_string(),
            value: Some(serde_json::json!(true)),
            ..Default::default()
        };
        assert!(matches!(
            CdpClient::parse_remote_object(&obj).unwrap(),
            EvaluationResult::Bool(true)
        ));
    }
}
