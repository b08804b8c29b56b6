//! Session registry
//!
//! The only shared mutable state in the core: a keyed collection of sessions
//! with exclusive per-key creation. One lock guards the map's structural
//! mutation; a per-key creation marker serializes same-key creates, so
//! unrelated keys never wait on each other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::auth::{AuthMaterial, AuthenticationFlow, LoginState};
use crate::config::Config;
use crate::driver::{DriverFactory, DriverHandle, LaunchSpec};
use crate::proxy::ProxyDescriptor;
use crate::session::session::{Session, SessionKey, SessionSummary};
use crate::session::visibility::VisibilityToggler;
use crate::{Error, Result};

/// Session registry
pub struct SessionRegistry {
    config: Config,
    factory: Arc<dyn DriverFactory>,
    flow: AuthenticationFlow,
    toggler: VisibilityToggler,
    /// Keyed sessions; the lock covers structural mutation only
    sessions: RwLock<HashMap<SessionKey, Arc<Session>>>,
    /// Keys with a create in progress
    creating: Arc<Mutex<HashSet<SessionKey>>>,
}

impl SessionRegistry {
    /// Create a new registry over a driver factory
    pub fn new(config: Config, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            flow: AuthenticationFlow::new(config.clone()),
            toggler: VisibilityToggler::new(Arc::clone(&factory), config.clone()),
            config,
            factory,
            sessions: RwLock::new(HashMap::new()),
            creating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create and authenticate a session for a key.
    ///
    /// An existing session for the key is closed first (best-effort). A
    /// second concurrent create for the same key is rejected with
    /// `ConcurrentCreation`; creates for different keys proceed in parallel.
    /// On any authentication failure the driver is torn down and a typed
    /// error is returned.
    pub async fn create(
        &self,
        key: SessionKey,
        material: AuthMaterial,
        proxy: Option<ProxyDescriptor>,
        headless: bool,
    ) -> Result<Arc<Session>> {
        let _marker = CreationMarker::acquire(Arc::clone(&self.creating), key.clone())?;

        // Recreation closes the previous session first; failures to close are
        // logged, not fatal
        let existing = self
            .sessions
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .remove(&key);
        if let Some(old) = existing {
            old.mark_closed();
            match old.driver() {
                Ok(driver) => {
                    if let Err(e) = driver.quit().await {
                        warn!("Failed to close previous session for {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Failed to reach previous driver for {}: {}", key, e),
            }
        }

        if self.count() >= self.config.max_sessions {
            return Err(Error::internal(format!(
                "Session limit reached ({})",
                self.config.max_sessions
            )));
        }

        info!(
            "Creating session {} via {} (headless={}, proxy={})",
            key,
            material.kind(),
            headless,
            proxy
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "direct".to_string())
        );

        let spec = LaunchSpec {
            headless,
            proxy: proxy.clone(),
            user_agent: self.config.user_agent.clone(),
            window_width: self.config.window_width,
            window_height: self.config.window_height,
            chrome_path: self.config.chrome_path.clone(),
        };
        let driver = self.factory.build(&spec).await?;
        let session = Arc::new(Session::new(key.clone(), Arc::clone(&driver), proxy));

        let outcome = match self.flow.login(driver.as_ref(), &material).await {
            Ok(outcome) => outcome,
            Err(e) => {
                Self::teardown_after_failure(&key, driver).await;
                return Err(e);
            }
        };

        match outcome.state {
            LoginState::Authenticated => {
                session.mark_ready();
                session.touch();
                info!("Session {} ready: {}", key, outcome.message);
                self.sessions
                    .write()
                    .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
                    .insert(key, Arc::clone(&session));
                Ok(session)
            }
            LoginState::CheckpointDetected => {
                Self::teardown_after_failure(&key, driver).await;
                Err(Error::checkpoint(outcome.message))
            }
            LoginState::Dead => {
                Self::teardown_after_failure(&key, driver).await;
                Err(Error::dead_account(outcome.message))
            }
        }
    }

    /// Get a session by key
    pub fn get(&self, key: &SessionKey) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::session_not_found(key.to_string()))
    }

    /// Close a session: mark Closed, release the driver, drop the entry.
    ///
    /// Idempotent; a second call for the same key is a no-op. Safe while
    /// another caller is mid-operation on the session: the operation observes
    /// Closed at its next driver command and aborts.
    pub async fn close(&self, key: &SessionKey) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .remove(key);

        let Some(session) = removed else {
            debug!("Close for unknown session {}, nothing to do", key);
            return Ok(());
        };

        session.mark_closed();
        let driver = session.driver()?;
        if let Err(e) = driver.quit().await {
            warn!("Driver teardown failed for {}: {}", key, e);
            return Err(Error::resource_teardown(format!(
                "Session {}: {}",
                key, e
            )));
        }

        info!("Session {} closed", key);
        Ok(())
    }

    /// Close every session; individual failures are collected, not fatal
    pub async fn close_all(&self) -> Vec<(SessionKey, Error)> {
        let keys: Vec<SessionKey> = self
            .sessions
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        let mut failures = Vec::new();
        for key in keys {
            if let Err(e) = self.close(&key).await {
                failures.push((key, e));
            }
        }

        info!("Closed all sessions ({} failures)", failures.len());
        failures
    }

    /// Flip a session's rendering mode, preserving authentication
    pub async fn toggle_visibility(&self, key: &SessionKey) -> Result<Arc<Session>> {
        let session = self.get(key)?;
        let guard = session.begin_operation()?;
        self.toggler.toggle(&session).await?;
        drop(guard);
        Ok(session)
    }

    /// Read-only snapshot of every session
    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .map(|m| m.values().map(|s| s.summary()).collect())
            .unwrap_or_default()
    }

    /// Number of live sessions
    pub fn count(&self) -> usize {
        self.sessions.read().map(|m| m.len()).unwrap_or(0)
    }

    async fn teardown_after_failure(key: &SessionKey, driver: Arc<dyn DriverHandle>) {
        if let Err(e) = driver.quit().await {
            warn!("Teardown after failed login for {}: {}", key, e);
        }
    }
}

/// RAII marker for a key's create-in-progress slot
struct CreationMarker {
    creating: Arc<Mutex<HashSet<SessionKey>>>,
    key: SessionKey,
}

impl CreationMarker {
    fn acquire(creating: Arc<Mutex<HashSet<SessionKey>>>, key: SessionKey) -> Result<Self> {
        {
            let mut set = creating
                .lock()
                .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
            if !set.insert(key.clone()) {
                return Err(Error::concurrent_creation(key.to_string()));
            }
        }
        Ok(Self { creating, key })
    }
}

impl Drop for CreationMarker {
    fn drop(&mut self) {
        if let Ok(mut set) = self.creating.lock() {
            set.remove(&self.key);
        }
    }
}
