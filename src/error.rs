//! Unified error types for Warden-Oxide

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Warden-Oxide
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// DevTools protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Login rejected: bad credentials/cookies, or a required 2FA seed is missing
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Account flagged for manual verification by the target site
    #[error("Account in checkpoint: {0}")]
    Checkpoint(String),

    /// Credentials or cookies rejected outright
    #[error("Account dead: {0}")]
    DeadAccount(String),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Driver could not establish a connection through the configured proxy
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session already has an operation in flight
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// A second concurrent create for the same key was rejected
    #[error("Concurrent creation rejected: {0}")]
    ConcurrentCreation(String),

    /// Driver failed to quit cleanly even after the forced kill
    #[error("Resource teardown failed: {0}")]
    ResourceTeardown(String),

    /// Element not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Error::Authentication(msg.into())
    }

    /// Create a new checkpoint error
    pub fn checkpoint<S: Into<String>>(msg: S) -> Self {
        Error::Checkpoint(msg.into())
    }

    /// Create a new dead-account error
    pub fn dead_account<S: Into<String>>(msg: S) -> Self {
        Error::DeadAccount(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new proxy error
    pub fn proxy<S: Into<String>>(msg: S) -> Self {
        Error::Proxy(msg.into())
    }

    /// Create a new session not found error
    pub fn session_not_found<S: Into<String>>(key: S) -> Self {
        Error::SessionNotFound(key.into())
    }

    /// Create a new session busy error
    pub fn session_busy<S: Into<String>>(key: S) -> Self {
        Error::SessionBusy(key.into())
    }

    /// Create a new concurrent creation error
    pub fn concurrent_creation<S: Into<String>>(key: S) -> Self {
        Error::ConcurrentCreation(key.into())
    }

    /// Create a new resource teardown error
    pub fn resource_teardown<S: Into<String>>(msg: S) -> Self {
        Error::ResourceTeardown(msg.into())
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(msg: S) -> Self {
        Error::ElementNotFound(msg.into())
    }

    /// Create a new navigation failed error
    pub fn navigation_failed<S: Into<String>>(msg: S) -> Self {
        Error::NavigationFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }
}
