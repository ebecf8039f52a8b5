//! Coverage for config parsing and path resolution.

use std::fs;
use std::time::Duration;

use vaultguard::auth::FactorKind;
use vaultguard::config::{config_dir, load_config, parse_config, Config, FactorDelays};

#[test]
fn default_delays_match_the_scan_timings() {
    let delays = FactorDelays::default();
    assert_eq!(delays.biometric, 3000);
    assert_eq!(delays.retinal, 2500);
    assert_eq!(delays.voice, 2000);
    assert_eq!(
        delays.delay_for(FactorKind::Retinal),
        Some(Duration::from_millis(2500))
    );
    assert_eq!(delays.delay_for(FactorKind::Passcode), None);

    let config = Config::default();
    assert_eq!(config.vault.toggle_delay(), Duration::from_millis(2000));
    assert_eq!(config.auth.grant_delay(), Duration::from_millis(1000));
    assert!(config.vault.initially_locked);
    assert!(config.auth.passcode.matches("2025"));
}

#[test]
fn config_dir_resolves() {
    let path = match config_dir() {
        Ok(path) => path,
        Err(err) => panic!("config dir should resolve: {err}"),
    };
    assert!(path.ends_with(".vaultguard"));
}

#[test]
fn empty_config_uses_defaults() {
    let config = parse_config("").expect("empty config should parse");
    assert_eq!(config.auth.factor_delays_ms.biometric, 3000);
    assert_eq!(config.ledger.max_entries, 0);
    assert!(!config.ledger.seed_history);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn parse_partial_config() {
    let toml_str = r#"
[auth]
passcode = "7391"

[vault]
toggle_delay_ms = 250
initially_locked = false

[ledger]
max_entries = 50
seed_history = true
"#;
    let config = parse_config(toml_str).expect("partial config should parse");
    assert!(config.auth.passcode.matches("7391"));
    assert!(!config.auth.passcode.matches("2025"));
    assert_eq!(config.auth.grant_delay_ms, 1000);
    assert_eq!(config.vault.toggle_delay_ms, 250);
    assert!(!config.vault.initially_locked);
    assert_eq!(config.ledger.max_entries, 50);
    assert!(config.ledger.seed_history);
}

#[test]
fn passcode_of_wrong_length_is_rejected() {
    for passcode in ["123", "12345", ""] {
        let toml_str = format!("[auth]\npasscode = \"{passcode}\"\n");
        let err = parse_config(&toml_str).expect_err("bad passcode must be rejected");
        assert!(
            err.to_string().contains("4 characters"),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn passcode_is_redacted_in_debug_output() {
    let config = parse_config("[auth]\npasscode = \"4242\"\n").expect("config should parse");
    let debug = format!("{config:?}");
    assert!(!debug.contains("4242"));
}

#[test]
fn load_config_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[logging]\nlevel = \"debug\"\n").expect("write config");

    let config = load_config(&path).expect("config should load");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn load_config_missing_file_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_config(&dir.path().join("absent.toml")).expect_err("missing file must fail");
    assert!(err.to_string().contains("failed to read config"));
}
