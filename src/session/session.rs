//! Session state
//!
//! One `Session` aggregates an exclusively-owned driver, its proxy
//! assignment, the headless flag, and the status state machine. Status is
//! monotonic except Ready↔Busy, which cycles during normal use.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::DriverHandle;
use crate::proxy::ProxyDescriptor;
use crate::{Error, Result};

/// External account identifier, the registry's map key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    /// Create a new key
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    /// Borrow the raw key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Driver built, login not yet finished
    Initializing,
    /// Authenticated and idle
    Ready,
    /// One operation in flight
    Busy,
    /// A hard failure left the session unusable; only close remains
    Error,
    /// Released; the entry is gone from the registry
    Closed,
}

/// Read-only snapshot handed to the API layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Account key
    pub key: SessionKey,
    /// Current status
    pub status: SessionStatus,
    /// Headless flag
    pub is_headless: bool,
    /// Whether a proxy is assigned
    pub has_proxy: bool,
    /// Proxy host, when assigned
    pub proxy_host: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last successful operation timestamp
    pub last_activity: DateTime<Utc>,
}

/// One account's browser session
#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    proxy: Option<ProxyDescriptor>,
    /// Exclusively owned driver; swapped only by the visibility toggle
    driver: RwLock<Arc<dyn DriverHandle>>,
    is_headless: AtomicBool,
    status: Mutex<SessionStatus>,
    created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl Session {
    /// Create a new session in the `Initializing` state
    pub fn new(
        key: SessionKey,
        driver: Arc<dyn DriverHandle>,
        proxy: Option<ProxyDescriptor>,
    ) -> Self {
        let now = Utc::now();
        let headless = driver.is_headless();
        Self {
            key,
            proxy,
            driver: RwLock::new(driver),
            is_headless: AtomicBool::new(headless),
            status: Mutex::new(SessionStatus::Initializing),
            created_at: now,
            last_activity: Mutex::new(now),
        }
    }

    /// Get the session key
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Get the proxy assignment
    pub fn proxy(&self) -> Option<&ProxyDescriptor> {
        self.proxy.as_ref()
    }

    /// Get the current driver
    pub fn driver(&self) -> Result<Arc<dyn DriverHandle>> {
        self.driver
            .read()
            .map(|d| Arc::clone(&d))
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))
    }

    /// Swap in a replacement driver (visibility toggle only)
    pub fn replace_driver(&self, driver: Arc<dyn DriverHandle>) -> Result<()> {
        let headless = driver.is_headless();
        *self
            .driver
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))? = driver;
        self.is_headless.store(headless, Ordering::SeqCst);
        Ok(())
    }

    /// Whether the session renders headless
    pub fn is_headless(&self) -> bool {
        self.is_headless.load(Ordering::SeqCst)
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionStatus::Error)
    }

    /// Mark the session authenticated and idle
    pub fn mark_ready(&self) {
        self.set_status(SessionStatus::Ready);
    }

    /// Mark the session failed; only close remains
    pub fn mark_error(&self) {
        self.set_status(SessionStatus::Error);
    }

    /// Mark the session closed. In-flight operations observe this at their
    /// next driver command and abort.
    pub fn mark_closed(&self) {
        self.set_status(SessionStatus::Closed);
    }

    fn set_status(&self, status: SessionStatus) {
        if let Ok(mut s) = self.status.lock() {
            *s = status;
        }
    }

    /// Take the session's single operation slot.
    ///
    /// Ready transitions to Busy; the returned guard restores Ready on drop
    /// unless the session moved to Error or Closed in the meantime. A second
    /// caller gets a busy rejection instead of sharing the driver.
    pub fn begin_operation(&self) -> Result<OperationGuard<'_>> {
        let mut status = self
            .status
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;

        match *status {
            SessionStatus::Ready => {
                *status = SessionStatus::Busy;
                Ok(OperationGuard { session: self })
            }
            SessionStatus::Busy | SessionStatus::Initializing => {
                Err(Error::session_busy(self.key.to_string()))
            }
            SessionStatus::Closed => Err(Error::session_not_found(self.key.to_string())),
            SessionStatus::Error => Err(Error::internal(format!(
                "Session {} is in error state",
                self.key
            ))),
        }
    }

    /// Refresh the activity timestamp
    pub fn touch(&self) {
        if let Ok(mut t) = self.last_activity.lock() {
            *t = Utc::now();
        }
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last activity timestamp
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
            .lock()
            .map(|t| *t)
            .unwrap_or(self.created_at)
    }

    /// Snapshot for the API layer
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            key: self.key.clone(),
            status: self.status(),
            is_headless: self.is_headless(),
            has_proxy: self.proxy.is_some(),
            proxy_host: self.proxy.as_ref().map(|p| p.host.clone()),
            created_at: self.created_at,
            last_activity: self.last_activity(),
        }
    }
}

/// RAII guard for the session's single operation slot
pub struct OperationGuard<'a> {
    session: &'a Session,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut status) = self.session.status.lock() {
            // Error and Closed are terminal; only Busy rolls back to Ready
            if *status == SessionStatus::Busy {
                *status = SessionStatus::Ready;
            }
        }
    }
}
