//! Common test utilities
//!
//! Shared fixtures for the integration suite: one-time tracing setup, a
//! fast-timeout configuration, and a factory whose drivers present a
//! logged-in profile.

use std::sync::{Arc, Once};

use warden_oxide::config::Config;
use warden_oxide::driver::{MockDriver, MockDriverFactory, Selector};

static INIT: Once = Once::new();

/// Initialize tracing once for the test binary
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Configuration with bounds short enough for tests
pub fn fast_config() -> Config {
    Config {
        login_wait_ms: 30,
        two_factor_wait_ms: 20,
        probe_wait_ms: 200,
        quit_grace_ms: 100,
        ..Config::default()
    }
}

/// Factory whose drivers always present a logged-in profile
pub fn live_factory() -> Arc<MockDriverFactory> {
    Arc::new(MockDriverFactory::with_template(|spec| {
        let driver = MockDriver::new(spec.headless);
        driver.insert_element(&Selector::css("h1"), "Nguyen Van A");
        driver
    }))
}
