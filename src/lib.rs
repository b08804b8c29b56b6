//! Warden-Oxide: browser session lifecycle core for automated account fleets
//!
//! This library owns one browser-automation driver per external account:
//! it authenticates (cookie injection or credential + TOTP two-factor flow),
//! classifies account state, and can switch a running session between
//! headless and visible rendering without losing authentication.

pub mod error;
pub mod config;

pub mod auth;
pub mod driver;
pub mod probe;
pub mod proxy;
pub mod session;
pub mod totp;

// Re-exports
pub use error::{Error, Result};

/// Warden-Oxide library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
