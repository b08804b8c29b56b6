//! Integration tests for session lifecycle management
//!
//! Exercises the registry invariants end-to-end against the scriptable mock
//! driver: per-key creation exclusivity, idempotent close, busy rejection,
//! and the visibility toggle round-trip.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthMaterial;
use crate::config::Config;
use crate::driver::traits::Cookie;
use crate::driver::{DriverHandle, MockDriver, MockDriverFactory, Selector};
use crate::probe::{AccountState, AccountStatusProbe};
use crate::session::{SessionKey, SessionRegistry, SessionStatus};
use crate::Error;

fn test_config() -> Config {
    Config {
        login_wait_ms: 30,
        two_factor_wait_ms: 20,
        probe_wait_ms: 200,
        quit_grace_ms: 100,
        max_sessions: 32,
        ..Config::default()
    }
}

/// Factory whose drivers always present a logged-in profile
fn live_factory() -> Arc<MockDriverFactory> {
    Arc::new(MockDriverFactory::with_template(|spec| {
        let driver = MockDriver::new(spec.headless);
        driver.insert_element(&Selector::css("h1"), "Nguyen Van A");
        driver
    }))
}

fn registry(factory: Arc<MockDriverFactory>) -> Arc<SessionRegistry> {
    Arc::new(SessionRegistry::new(test_config(), factory))
}

fn jar() -> AuthMaterial {
    AuthMaterial::cookies(vec![
        Cookie::new("c_user", "100001234").with_domain(".facebook.com"),
        Cookie::new("xs", "token").with_domain(".facebook.com"),
    ])
}

#[tokio::test]
async fn test_create_and_get() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-1");

    let session = registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();

    assert_eq!(session.status(), SessionStatus::Ready);
    assert!(session.is_headless());
    assert_eq!(registry.count(), 1);

    let fetched = registry.get(&key).unwrap();
    assert_eq!(fetched.key(), &key);

    let summaries = registry.list();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].key, key);
    assert!(!summaries[0].has_proxy);
}

#[tokio::test]
async fn test_create_dead_cookies_tears_down() {
    let factory = Arc::new(MockDriverFactory::with_template(|spec| {
        let driver = MockDriver::new(spec.headless);
        driver.redirect(
            "https://www.facebook.com/me",
            "https://www.facebook.com/login.php?next=%2Fme",
        );
        driver
    }));
    let registry = registry(Arc::clone(&factory));

    let result = registry
        .create(SessionKey::from("acc-dead"), jar(), None, true)
        .await;
    assert!(matches!(result, Err(Error::DeadAccount(_))));
    assert_eq!(registry.count(), 0);

    // The driver that was built for the attempt is released
    let drivers = factory.drivers();
    assert_eq!(drivers.len(), 1);
    assert!(!drivers[0].is_active());
}

#[tokio::test]
async fn test_create_checkpoint_is_typed() {
    let factory = Arc::new(MockDriverFactory::with_template(|spec| {
        let driver = MockDriver::new(spec.headless);
        driver.redirect(
            "https://www.facebook.com/me",
            "https://www.facebook.com/checkpoint/828281883",
        );
        driver
    }));
    let registry = registry(factory);

    let result = registry
        .create(SessionKey::from("acc-cp"), jar(), None, true)
        .await;
    assert!(matches!(result, Err(Error::Checkpoint(_))));
    assert_eq!(registry.count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_same_key_is_exclusive() {
    let factory = live_factory();
    factory.set_build_delay(Duration::from_millis(100));
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-race");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            registry.create(key, jar(), None, true).await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(Error::ConcurrentCreation(_)) => rejections += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert!(successes >= 1);
    assert_eq!(successes + rejections, 8);
    // Never two drivers under construction for the same key at once
    assert_eq!(factory.max_in_flight(), 1);
    assert_eq!(registry.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_creates_for_different_keys_run_in_parallel() {
    let factory = live_factory();
    factory.set_build_delay(Duration::from_millis(100));
    let registry = registry(Arc::clone(&factory));

    let mut handles = Vec::new();
    for i in 0..6 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .create(SessionKey::from(format!("acc-{}", i)), jar(), None, true)
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(registry.count(), 6);
    // Unrelated keys overlap instead of serializing on the registry
    assert!(factory.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_recreate_closes_previous_session() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-again");

    registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();
    registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();

    assert_eq!(registry.count(), 1);
    let drivers = factory.drivers();
    assert_eq!(drivers.len(), 2);
    assert!(!drivers[0].is_active());
    assert!(drivers[1].is_active());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-close");

    registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();

    registry.close(&key).await.unwrap();
    assert!(matches!(
        registry.get(&key),
        Err(Error::SessionNotFound(_))
    ));
    assert_eq!(registry.count(), 0);

    // Second close is a no-op, never an error
    registry.close(&key).await.unwrap();
}

#[tokio::test]
async fn test_close_all_collects_failures() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));

    for key in ["acc-a", "acc-b", "acc-c"] {
        registry
            .create(SessionKey::from(key), jar(), None, true)
            .await
            .unwrap();
    }

    // The second driver refuses to die
    factory.drivers()[1].set_fail_quit(true);

    let failures = registry.close_all().await;
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, Error::ResourceTeardown(_)));
    // Every entry is gone either way
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_busy_session_rejects_second_operation() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-busy");

    let session = registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();

    let guard = session.begin_operation().unwrap();
    assert_eq!(session.status(), SessionStatus::Busy);

    assert!(matches!(
        registry.toggle_visibility(&key).await,
        Err(Error::SessionBusy(_))
    ));

    let probe = AccountStatusProbe::new(test_config());
    assert!(matches!(
        probe.classify(&session).await,
        Err(Error::SessionBusy(_))
    ));

    drop(guard);
    registry.toggle_visibility(&key).await.unwrap();
}

#[tokio::test]
async fn test_toggle_round_trip() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-toggle");

    let session = registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();
    assert!(session.is_headless());

    // Login verification leaves the driver at the profile location
    let location = session.driver().unwrap().current_url().await.unwrap();
    assert_eq!(location, "https://www.facebook.com/me");

    registry.toggle_visibility(&key).await.unwrap();
    assert!(!session.is_headless());
    assert_eq!(session.status(), SessionStatus::Ready);

    registry.toggle_visibility(&key).await.unwrap();
    assert!(session.is_headless());
    assert_eq!(session.status(), SessionStatus::Ready);

    // The final driver carries the same cookies and the same location
    let drivers = factory.drivers();
    let last = drivers.last().unwrap();
    let mut names: Vec<String> = last
        .cookie_snapshot()
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["c_user=100001234".to_string(), "xs=token".to_string()]
    );
    assert_eq!(
        last.current_url().await.unwrap(),
        "https://www.facebook.com/me"
    );
}

#[tokio::test]
async fn test_toggle_failure_keeps_key_registered() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-stuck");

    let session = registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();

    factory.fail_next_build();
    let result = registry.toggle_visibility(&key).await;
    assert!(result.is_err());
    assert_eq!(session.status(), SessionStatus::Error);

    // The key stays present for an explicit close
    assert!(registry.get(&key).is_ok());
    registry.close(&key).await.unwrap();
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_probe_classifies_registered_session() {
    let factory = live_factory();
    let registry = registry(Arc::clone(&factory));
    let key = SessionKey::from("acc-probe");

    let session = registry
        .create(key.clone(), jar(), None, true)
        .await
        .unwrap();

    let probe = AccountStatusProbe::new(test_config());
    let report = probe.classify(&session).await.unwrap();
    assert_eq!(report.state, AccountState::Live);
    assert_eq!(report.account_name.as_deref(), Some("Nguyen Van A"));

    // The operation slot is free again afterwards
    assert_eq!(session.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_session_limit_enforced() {
    let factory = live_factory();
    let config = Config {
        max_sessions: 2,
        ..test_config()
    };
    let registry = Arc::new(SessionRegistry::new(config, factory));

    for key in ["acc-1", "acc-2"] {
        registry
            .create(SessionKey::from(key), jar(), None, true)
            .await
            .unwrap();
    }

    let result = registry
        .create(SessionKey::from("acc-3"), jar(), None, true)
        .await;
    match result {
        Err(Error::Internal(msg)) => assert!(msg.contains("limit")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(registry.count(), 2);
}
