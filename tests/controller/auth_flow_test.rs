//! Authentication flow through the controller on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use vaultguard::auth::FactorKind;
use vaultguard::clock::ManualClock;
use vaultguard::config::Config;
use vaultguard::controller::{Controller, ControllerHandle, Notice, PhaseView, SecuritySnapshot};
use vaultguard::types::AccessLevel;

fn spawn(config: &Config) -> ControllerHandle {
    Controller::spawn(config, Arc::new(ManualClock::new(Utc::now())))
}

fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

fn step(snapshot: &SecuritySnapshot) -> u8 {
    snapshot
        .phase
        .progress()
        .map(|p| p.current_step)
        .expect("still authenticating")
}

async fn settle_scan(handle: &ControllerHandle, kind: FactorKind, delay_ms: u64) -> SecuritySnapshot {
    handle.start_auth_factor(kind).await.expect("controller alive");
    handle.flush().await.expect("controller alive");
    tokio::time::advance(Duration::from_millis(delay_ms)).await;
    handle.flush().await.expect("controller alive")
}

#[tokio::test(start_paused = true)]
async fn full_sequence_grants_access_once() {
    let handle = spawn(&Config::default());
    let mut notices = handle.notices();

    let snapshot = handle.flush().await.expect("controller alive");
    assert_eq!(step(&snapshot), 1);
    assert!(snapshot.ledger.is_empty());

    assert_eq!(step(&settle_scan(&handle, FactorKind::Biometric, 3000).await), 2);
    assert_eq!(step(&settle_scan(&handle, FactorKind::Retinal, 2500).await), 3);
    assert_eq!(step(&settle_scan(&handle, FactorKind::Voice, 2000).await), 4);

    handle.submit_passcode("2025").await.expect("controller alive");
    let snapshot = handle.flush().await.expect("controller alive");
    assert!(matches!(snapshot.phase, PhaseView::Granting { .. }));
    assert_eq!(snapshot.status.access_level, AccessLevel::None);

    tokio::time::advance(Duration::from_millis(1000)).await;
    let snapshot = handle.flush().await.expect("controller alive");
    assert!(snapshot.phase.is_authenticated());
    assert_eq!(snapshot.status.access_level, AccessLevel::Full);
    assert_eq!(snapshot.status.active_sessions, 1);
    assert_eq!(snapshot.ledger.len(), 1);
    assert_eq!(snapshot.ledger[0].action(), "Login");

    let seen = drain(&mut notices);
    let authenticated = seen
        .iter()
        .filter(|n| matches!(n, Notice::Authenticated { .. }))
        .count();
    assert_eq!(authenticated, 1);
    assert!(seen.contains(&Notice::FactorVerified(FactorKind::Voice)));

    // The sequencer is gone; further passcodes change nothing.
    handle.submit_passcode("2025").await.expect("controller alive");
    tokio::time::advance(Duration::from_millis(5000)).await;
    let snapshot = handle.flush().await.expect("controller alive");
    assert_eq!(snapshot.status.active_sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn scan_settles_only_after_its_delay() {
    let handle = spawn(&Config::default());

    handle
        .start_auth_factor(FactorKind::Biometric)
        .await
        .expect("controller alive");
    let snapshot = handle.flush().await.expect("controller alive");
    let progress = snapshot.phase.progress().expect("authenticating");
    assert_eq!(progress.scanning, Some(FactorKind::Biometric));

    tokio::time::advance(Duration::from_millis(2999)).await;
    assert_eq!(step(&handle.flush().await.expect("controller alive")), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    let snapshot = handle.flush().await.expect("controller alive");
    assert_eq!(step(&snapshot), 2);
    assert_eq!(
        snapshot.phase.progress().map(|p| p.completed.clone()),
        Some(vec![FactorKind::Biometric])
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_scan_request_is_a_no_op() {
    let handle = spawn(&Config::default());
    let mut notices = handle.notices();

    handle
        .start_auth_factor(FactorKind::Biometric)
        .await
        .expect("controller alive");
    handle.flush().await.expect("controller alive");
    tokio::time::advance(Duration::from_millis(1000)).await;
    handle
        .start_auth_factor(FactorKind::Biometric)
        .await
        .expect("controller alive");
    handle.flush().await.expect("controller alive");

    // Settles 3000ms after the first request, not the second.
    tokio::time::advance(Duration::from_millis(2000)).await;
    assert_eq!(step(&handle.flush().await.expect("controller alive")), 2);

    tokio::time::advance(Duration::from_millis(5000)).await;
    assert_eq!(step(&handle.flush().await.expect("controller alive")), 2);

    let seen = drain(&mut notices);
    let started = seen
        .iter()
        .filter(|n| **n == Notice::ScanStarted(FactorKind::Biometric))
        .count();
    assert_eq!(started, 1);
    assert!(!seen.iter().any(|n| matches!(n, Notice::Rejected { .. })));
}

#[tokio::test(start_paused = true)]
async fn out_of_order_factor_is_rejected() {
    let handle = spawn(&Config::default());
    let mut notices = handle.notices();

    handle
        .start_auth_factor(FactorKind::Voice)
        .await
        .expect("controller alive");
    let snapshot = handle.flush().await.expect("controller alive");
    assert_eq!(step(&snapshot), 1);
    assert_eq!(snapshot.phase.progress().and_then(|p| p.scanning), None);

    let seen = drain(&mut notices);
    assert!(matches!(
        seen.as_slice(),
        [Notice::Rejected {
            intent: "start_auth_factor",
            ..
        }]
    ));
}

#[tokio::test(start_paused = true)]
async fn wrong_passcode_raises_rejection_and_allows_retry() {
    let handle = spawn(&Config::default().without_delays());
    for kind in [FactorKind::Biometric, FactorKind::Retinal, FactorKind::Voice] {
        handle.start_auth_factor(kind).await.expect("controller alive");
    }
    assert_eq!(step(&handle.flush().await.expect("controller alive")), 4);

    let mut notices = handle.notices();
    handle.submit_passcode("1999").await.expect("controller alive");
    let snapshot = handle.flush().await.expect("controller alive");
    assert_eq!(step(&snapshot), 4);
    assert_eq!(snapshot.status.access_level, AccessLevel::None);
    assert_eq!(drain(&mut notices), vec![Notice::PasscodeRejected]);

    handle.submit_passcode("2025").await.expect("controller alive");
    let snapshot = handle.flush().await.expect("controller alive");
    assert!(snapshot.phase.is_authenticated());
    assert_eq!(snapshot.status.access_level, AccessLevel::Full);
}

#[tokio::test(start_paused = true)]
async fn custom_delays_and_secret_are_used() {
    let config: Config = vaultguard::config::parse_config(
        r#"
[auth]
passcode = "9q9q"
grant_delay_ms = 0

[auth.factor_delays_ms]
biometric = 10
retinal = 10
voice = 10
"#,
    )
    .expect("valid config");
    let handle = spawn(&config);

    assert_eq!(step(&settle_scan(&handle, FactorKind::Biometric, 10).await), 2);
    assert_eq!(step(&settle_scan(&handle, FactorKind::Retinal, 10).await), 3);
    assert_eq!(step(&settle_scan(&handle, FactorKind::Voice, 10).await), 4);

    handle.submit_passcode("2025").await.expect("controller alive");
    assert!(!handle.flush().await.expect("controller alive").phase.is_authenticated());

    handle.submit_passcode("9q9q").await.expect("controller alive");
    assert!(handle.flush().await.expect("controller alive").phase.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn each_factor_uses_its_own_delay() {
    let mut config = Config::default();
    config.auth.factor_delays_ms.biometric = 100;
    config.auth.factor_delays_ms.retinal = 700;
    config.auth.factor_delays_ms.voice = 40;
    let handle = spawn(&config);

    assert_eq!(step(&settle_scan(&handle, FactorKind::Biometric, 100).await), 2);

    handle
        .start_auth_factor(FactorKind::Retinal)
        .await
        .expect("controller alive");
    handle.flush().await.expect("controller alive");
    tokio::time::advance(Duration::from_millis(699)).await;
    assert_eq!(step(&handle.flush().await.expect("controller alive")), 2);
    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(step(&handle.flush().await.expect("controller alive")), 3);

    assert_eq!(step(&settle_scan(&handle, FactorKind::Voice, 40).await), 4);
}
