//! Grant and toggle tests against the store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use vaultguard::auth::{AuthSequencer, Authenticated, FactorKind, Passcode};
use vaultguard::clock::{Clock, ManualClock};
use vaultguard::ledger::{ACTION_LOGIN, ACTION_VAULT_LOCKED, ACTION_VAULT_OPENED};
use vaultguard::scheduler::{ScheduledTask, Scheduler};
use vaultguard::store::{SecurityStateStore, StoreOptions};
use vaultguard::types::{AccessLevel, ThreatLevel};
use vaultguard::vault::VaultError;

fn authenticate() -> Authenticated {
    let mut seq = AuthSequencer::new(Passcode::default());
    for kind in [FactorKind::Biometric, FactorKind::Retinal, FactorKind::Voice] {
        seq.start_factor(kind).expect("scan should start");
        seq.settle_scan(kind).expect("scan should settle");
    }
    seq.submit_passcode("2025").expect("passcode accepted")
}

fn store_with_clock() -> (SecurityStateStore, Arc<ManualClock>) {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).single().expect("valid time");
    let clock = Arc::new(ManualClock::new(start));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    (SecurityStateStore::new(dyn_clock, StoreOptions::default()), clock)
}

#[test]
fn grant_access_sets_full_and_logs_login() {
    let (mut store, clock) = store_with_clock();
    clock.advance(Duration::seconds(30));

    store.grant_access(authenticate());

    let status = store.status();
    assert_eq!(status.access_level, AccessLevel::Full);
    assert_eq!(status.active_sessions, 1);
    assert_eq!(status.last_access, clock.now());
    assert!(status.vault_locked, "granting does not open the vault");

    let log = store.access_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action(), ACTION_LOGIN);
    assert_eq!(log[0].user(), "Authorized User");
    assert_eq!(log[0].status().as_str(), "Success");
}

#[test]
fn repeated_grants_only_ever_increment_sessions() {
    let (mut store, _clock) = store_with_clock();
    for expected in 1..=3u32 {
        store.grant_access(authenticate());
        assert_eq!(store.status().active_sessions, expected);
    }
    assert_eq!(store.access_log().len(), 3);
}

#[tokio::test]
async fn toggle_requires_authentication() {
    let (mut store, _clock) = store_with_clock();
    let mut scheduler = Scheduler::new();
    let op = scheduler.schedule(std::time::Duration::ZERO, ScheduledTask::VaultToggle);
    assert_eq!(store.begin_toggle(op), Err(VaultError::NotAuthenticated));
    assert!(!store.is_toggle_pending());
    assert!(store.access_log().is_empty());
}

#[tokio::test]
async fn two_toggles_restore_state_with_two_entries() {
    let (mut store, _clock) = store_with_clock();
    store.grant_access(authenticate());
    let before = store.status().vault_locked;
    let mut scheduler = Scheduler::new();

    let first = scheduler.schedule(std::time::Duration::ZERO, ScheduledTask::VaultToggle);
    store.begin_toggle(first).expect("toggle admitted");
    let opened = store.settle_toggle(first).expect("toggle settles");
    assert!(!opened.locked);
    assert!(!opened.superseded);

    let second = scheduler.schedule(std::time::Duration::ZERO, ScheduledTask::VaultToggle);
    store.begin_toggle(second).expect("toggle admitted");
    let locked = store.settle_toggle(second).expect("toggle settles");
    assert!(locked.locked);

    assert_eq!(store.status().vault_locked, before);
    let actions: Vec<_> = store
        .access_log()
        .iter()
        .map(|e| e.action().to_owned())
        .collect();
    assert_eq!(actions, vec![ACTION_VAULT_LOCKED, ACTION_VAULT_OPENED, ACTION_LOGIN]);
}

#[tokio::test]
async fn pending_toggle_leaves_state_untouched() {
    let (mut store, _clock) = store_with_clock();
    store.grant_access(authenticate());
    let before = store.status();
    let mut scheduler = Scheduler::new();

    let op = scheduler.schedule(std::time::Duration::from_secs(2), ScheduledTask::VaultToggle);
    store.begin_toggle(op).expect("toggle admitted");

    assert!(store.is_toggle_pending());
    assert_eq!(store.status(), before);
    assert_eq!(store.access_log().len(), 1);
}

#[tokio::test]
async fn duplicate_toggle_is_rejected() {
    let (mut store, _clock) = store_with_clock();
    store.grant_access(authenticate());
    let mut scheduler = Scheduler::new();

    let first = scheduler.schedule(std::time::Duration::ZERO, ScheduledTask::VaultToggle);
    let second = scheduler.schedule(std::time::Duration::ZERO, ScheduledTask::VaultToggle);
    store.begin_toggle(first).expect("toggle admitted");
    assert_eq!(
        store.begin_toggle(second),
        Err(VaultError::DuplicateToggleRequest)
    );
    assert_eq!(
        store.settle_toggle(second),
        Err(VaultError::NoTogglePending(second))
    );

    store.settle_toggle(first).expect("first toggle settles");
    assert!(!store.status().vault_locked);
    assert_eq!(store.status().threat_level, ThreatLevel::Low);
}

#[test]
fn seeded_store_starts_with_history() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    let store = SecurityStateStore::new(
        clock,
        StoreOptions {
            seed_history: true,
            ..StoreOptions::default()
        },
    );
    assert_eq!(store.ledger().len(), 3);
}
