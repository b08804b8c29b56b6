//! Mock driver implementation for testing
//!
//! Scriptable stand-in for the Chrome-backed driver: tests decide which
//! elements exist, where navigations land, and which operations fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::traits::{
    Cookie, DriverFactory, DriverHandle, ElementInfo, EvaluationResult, LaunchSpec,
    NavigationResult, Selector,
};
use crate::Error;

/// Minimal 1x1 PNG header used as the mock screenshot payload
const MOCK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE,
];

/// Scriptable mock driver
#[derive(Debug)]
pub struct MockDriver {
    id: String,
    headless: bool,
    current_url: Mutex<String>,
    /// Requested URL -> URL the navigation actually lands at
    redirects: Mutex<HashMap<String, String>>,
    /// Selector description -> element text
    elements: Mutex<HashMap<String, String>>,
    cookies: Mutex<Vec<Cookie>>,
    /// Cookie names the browser refuses to store
    rejected_cookies: Mutex<Vec<String>>,
    /// Recorded (selector, text) pairs from type_text
    typed: Mutex<Vec<(String, String)>>,
    /// Recorded selector descriptions from click
    clicked: Mutex<Vec<String>>,
    fail_navigation: AtomicBool,
    fail_quit: AtomicBool,
    is_active: AtomicBool,
}

impl MockDriver {
    /// Create a new mock driver
    pub fn new(headless: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            headless,
            current_url: Mutex::new("about:blank".to_string()),
            redirects: Mutex::new(HashMap::new()),
            elements: Mutex::new(HashMap::new()),
            cookies: Mutex::new(Vec::new()),
            rejected_cookies: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
            clicked: Mutex::new(Vec::new()),
            fail_navigation: AtomicBool::new(false),
            fail_quit: AtomicBool::new(false),
            is_active: AtomicBool::new(true),
        }
    }

    /// Script an element into the page
    pub fn insert_element(&self, selector: &Selector, text: &str) {
        self.elements
            .lock()
            .expect("elements lock")
            .insert(selector.describe(), text.to_string());
    }

    /// Remove a scripted element
    pub fn remove_element(&self, selector: &Selector) {
        self.elements
            .lock()
            .expect("elements lock")
            .remove(&selector.describe());
    }

    /// Script a navigation: requests for `from` land at `to`
    pub fn redirect<S: Into<String>>(&self, from: S, to: S) {
        self.redirects
            .lock()
            .expect("redirects lock")
            .insert(from.into(), to.into());
    }

    /// Make the browser refuse to store a cookie by name
    pub fn reject_cookie<S: Into<String>>(&self, name: S) {
        self.rejected_cookies
            .lock()
            .expect("rejected lock")
            .push(name.into());
    }

    /// Make every navigation fail with a transport error
    pub fn set_fail_navigation(&self, fail: bool) {
        self.fail_navigation.store(fail, Ordering::SeqCst);
    }

    /// Make quit fail even after the forced path
    pub fn set_fail_quit(&self, fail: bool) {
        self.fail_quit.store(fail, Ordering::SeqCst);
    }

    /// Recorded type_text calls as (selector description, text)
    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.lock().expect("typed lock").clone()
    }

    /// Recorded click calls as selector descriptions
    pub fn clicked(&self) -> Vec<String> {
        self.clicked.lock().expect("clicked lock").clone()
    }

    /// Current cookie store snapshot
    pub fn cookie_snapshot(&self) -> Vec<Cookie> {
        self.cookies.lock().expect("cookies lock").clone()
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.is_active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::websocket("Driver is not active"))
        }
    }
}

#[async_trait]
impl DriverHandle for MockDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_headless(&self) -> bool {
        self.headless
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        self.ensure_active()?;
        if self.fail_navigation.load(Ordering::SeqCst) {
            return Err(Error::navigation_failed(format!(
                "Navigation to {} failed: net::ERR_CONNECTION_RESET",
                url
            )));
        }

        let landing = self
            .redirects
            .lock()
            .expect("redirects lock")
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());

        *self.current_url.lock().expect("url lock") = landing.clone();
        Ok(NavigationResult {
            url: landing,
            loaded: true,
        })
    }

    async fn current_url(&self) -> Result<String, Error> {
        self.ensure_active()?;
        Ok(self.current_url.lock().expect("url lock").clone())
    }

    async fn reload(&self) -> Result<(), Error> {
        self.ensure_active()?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<EvaluationResult, Error> {
        self.ensure_active()?;
        if script.contains("window.location.href") {
            return Ok(EvaluationResult::String(
                self.current_url.lock().expect("url lock").clone(),
            ));
        }
        Ok(EvaluationResult::Null)
    }

    async fn find_element(&self, selector: &Selector) -> Result<Option<ElementInfo>, Error> {
        self.ensure_active()?;
        Ok(self
            .elements
            .lock()
            .expect("elements lock")
            .get(&selector.describe())
            .map(|text| ElementInfo {
                text: text.clone(),
                visible: true,
            }))
    }

    async fn click(&self, selector: &Selector) -> Result<(), Error> {
        self.ensure_active()?;
        let present = self
            .elements
            .lock()
            .expect("elements lock")
            .contains_key(&selector.describe());
        if !present {
            return Err(Error::element_not_found(selector.describe()));
        }
        self.clicked
            .lock()
            .expect("clicked lock")
            .push(selector.describe());
        Ok(())
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> Result<(), Error> {
        self.ensure_active()?;
        let present = self
            .elements
            .lock()
            .expect("elements lock")
            .contains_key(&selector.describe());
        if !present {
            return Err(Error::element_not_found(selector.describe()));
        }
        self.typed
            .lock()
            .expect("typed lock")
            .push((selector.describe(), text.to_string()));
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, Error> {
        self.ensure_active()?;
        Ok(self.cookies.lock().expect("cookies lock").clone())
    }

    async fn set_cookie(&self, cookie: &Cookie) -> Result<(), Error> {
        self.ensure_active()?;
        if self
            .rejected_cookies
            .lock()
            .expect("rejected lock")
            .contains(&cookie.name)
        {
            return Err(Error::cdp(format!(
                "Cookie {} rejected by browser",
                cookie.name
            )));
        }

        let mut store = self.cookies.lock().expect("cookies lock");
        if let Some(existing) = store.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie.clone();
        } else {
            store.push(cookie.clone());
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, Error> {
        self.ensure_active()?;
        Ok(MOCK_PNG.to_vec())
    }

    async fn quit(&self) -> Result<(), Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.fail_quit.load(Ordering::SeqCst) {
            return Err(Error::resource_teardown(format!(
                "Driver {} could not be killed",
                self.id
            )));
        }
        self.is_active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Template applied to every driver the mock factory builds
pub type MockDriverTemplate = dyn Fn(&LaunchSpec) -> MockDriver + Send + Sync;

/// Scriptable driver factory for tests
pub struct MockDriverFactory {
    template: Arc<MockDriverTemplate>,
    /// Every driver built, in order
    drivers: Mutex<Vec<Arc<MockDriver>>>,
    /// Artificial build latency, used to widen race windows in tests
    build_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_next_build: AtomicBool,
}

impl MockDriverFactory {
    /// Create a factory producing bare drivers
    pub fn new() -> Self {
        Self::with_template(|spec| MockDriver::new(spec.headless))
    }

    /// Create a factory with a custom per-driver template
    pub fn with_template<F>(template: F) -> Self
    where
        F: Fn(&LaunchSpec) -> MockDriver + Send + Sync + 'static,
    {
        Self {
            template: Arc::new(template),
            drivers: Mutex::new(Vec::new()),
            build_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fail_next_build: AtomicBool::new(false),
        }
    }

    /// Delay every build, widening the window concurrent creates race over
    pub fn set_build_delay(&self, delay: Duration) {
        *self.build_delay.lock().expect("delay lock") = delay;
    }

    /// Make the next build fail
    pub fn fail_next_build(&self) {
        self.fail_next_build.store(true, Ordering::SeqCst);
    }

    /// Total drivers built so far
    pub fn built_count(&self) -> usize {
        self.drivers.lock().expect("drivers lock").len()
    }

    /// Highest number of builds ever in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of every driver built, in build order
    pub fn drivers(&self) -> Vec<Arc<MockDriver>> {
        self.drivers.lock().expect("drivers lock").clone()
    }
}

impl Default for MockDriverFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    async fn build(&self, spec: &LaunchSpec) -> Result<Arc<dyn DriverHandle>, Error> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.build_delay.lock().expect("delay lock");
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        let result: Result<Arc<dyn DriverHandle>, Error> =
            if self.fail_next_build.swap(false, Ordering::SeqCst) {
                Err(Error::internal("Driver construction failed"))
            } else {
                let driver = Arc::new((self.template)(spec));
                self.drivers
                    .lock()
                    .expect("drivers lock")
                    .push(Arc::clone(&driver));
                Ok(driver)
            };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_navigation_redirect() {
        let driver = MockDriver::new(true);
        driver.redirect("https://example.com/me", "https://example.com/login");

        let result = driver.navigate("https://example.com/me").await.unwrap();
        assert_eq!(result.url, "https://example.com/login");
        assert_eq!(
            driver.current_url().await.unwrap(),
            "https://example.com/login"
        );
    }

    #[tokio::test]
    async fn test_mock_elements_and_typing() {
        let driver = MockDriver::new(true);
        let field = Selector::css("#email");
        driver.insert_element(&field, "");

        driver.type_text(&field, "user@example.com").await.unwrap();
        assert_eq!(
            driver.typed(),
            vec![("css:#email".to_string(), "user@example.com".to_string())]
        );

        let missing = Selector::css("#nope");
        assert!(matches!(
            driver.type_text(&missing, "x").await,
            Err(Error::ElementNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_cookie_upsert_and_rejection() {
        let driver = MockDriver::new(true);
        driver.reject_cookie("bad");

        driver.set_cookie(&Cookie::new("good", "1")).await.unwrap();
        driver.set_cookie(&Cookie::new("good", "2")).await.unwrap();
        assert!(driver.set_cookie(&Cookie::new("bad", "x")).await.is_err());

        let cookies = driver.cookie_snapshot();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "2");
    }

    #[tokio::test]
    async fn test_mock_quit_deactivates() {
        let driver = MockDriver::new(true);
        driver.quit().await.unwrap();
        assert!(!driver.is_active());
        assert!(driver.navigate("https://example.com").await.is_err());
        // Idempotent
        driver.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_factory_counts_builds() {
        let factory = MockDriverFactory::new();
        factory.build(&LaunchSpec::default()).await.unwrap();
        factory.build(&LaunchSpec::default()).await.unwrap();
        assert_eq!(factory.built_count(), 2);
    }

    #[tokio::test]
    async fn test_factory_fail_next_build() {
        let factory = MockDriverFactory::new();
        factory.fail_next_build();
        assert!(factory.build(&LaunchSpec::default()).await.is_err());
        // Only the next build fails
        assert!(factory.build(&LaunchSpec::default()).await.is_ok());
    }
}
