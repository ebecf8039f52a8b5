//! Configuration loading and validation.
//!
//! Every option has a default, so an empty file (or no file at all) yields
//! the stock controller: passcode `2025`, scan delays of 3000/2500/2000 ms,
//! and a 2000 ms vault toggle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::auth::{FactorKind, Passcode, PASSCODE_LEN};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Authentication sequence settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Vault control settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Access ledger settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Authentication sequence settings.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Secret checked at the passcode step. Must be four characters.
    #[serde(default)]
    pub passcode: Passcode,

    /// Pause between passcode acceptance and access being granted.
    #[serde(default = "default_grant_delay_ms")]
    pub grant_delay_ms: u64,

    /// Settle delay for each scanned factor.
    #[serde(default)]
    pub factor_delays_ms: FactorDelays,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            passcode: Passcode::default(),
            grant_delay_ms: default_grant_delay_ms(),
            factor_delays_ms: FactorDelays::default(),
        }
    }
}

impl AuthConfig {
    /// Grant delay as a [`Duration`].
    pub fn grant_delay(&self) -> Duration {
        Duration::from_millis(self.grant_delay_ms)
    }
}

/// Per-factor scan settle delays in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FactorDelays {
    /// Biometric scan delay.
    #[serde(default = "default_biometric_ms")]
    pub biometric: u64,

    /// Retinal scan delay.
    #[serde(default = "default_retinal_ms")]
    pub retinal: u64,

    /// Voice recognition delay.
    #[serde(default = "default_voice_ms")]
    pub voice: u64,
}

impl Default for FactorDelays {
    fn default() -> Self {
        Self {
            biometric: default_biometric_ms(),
            retinal: default_retinal_ms(),
            voice: default_voice_ms(),
        }
    }
}

impl FactorDelays {
    /// Settle delay for a scanned factor. `None` for the passcode.
    pub fn delay_for(&self, kind: FactorKind) -> Option<Duration> {
        let ms = match kind {
            FactorKind::Biometric => self.biometric,
            FactorKind::Retinal => self.retinal,
            FactorKind::Voice => self.voice,
            FactorKind::Passcode => return None,
        };
        Some(Duration::from_millis(ms))
    }
}

/// Vault control settings.
#[derive(Debug, Deserialize)]
pub struct VaultConfig {
    /// Settle delay for a lock/unlock toggle.
    #[serde(default = "default_toggle_delay_ms")]
    pub toggle_delay_ms: u64,

    /// Whether the vault starts sealed.
    #[serde(default = "default_initially_locked")]
    pub initially_locked: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            toggle_delay_ms: default_toggle_delay_ms(),
            initially_locked: default_initially_locked(),
        }
    }
}

impl VaultConfig {
    /// Toggle delay as a [`Duration`].
    pub fn toggle_delay(&self) -> Duration {
        Duration::from_millis(self.toggle_delay_ms)
    }
}

/// Access ledger settings.
#[derive(Debug, Default, Deserialize)]
pub struct LedgerConfig {
    /// Newest entries to retain. `0` keeps everything.
    #[serde(default)]
    pub max_entries: usize,

    /// Pre-populate the ledger with three historical entries.
    #[serde(default)]
    pub seed_history: bool,
}

/// Log output settings.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions for serde

fn default_grant_delay_ms() -> u64 {
    1000
}
fn default_biometric_ms() -> u64 {
    3000
}
fn default_retinal_ms() -> u64 {
    2500
}
fn default_voice_ms() -> u64 {
    2000
}
fn default_toggle_delay_ms() -> u64 {
    2000
}
fn default_initially_locked() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_owned()
}

impl Config {
    /// Check constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if the passcode is not exactly four characters.
    pub fn validate(&self) -> anyhow::Result<()> {
        let len = self.auth.passcode.char_len();
        if len != PASSCODE_LEN {
            anyhow::bail!("auth.passcode must be {PASSCODE_LEN} characters, got {len}");
        }
        Ok(())
    }

    /// Same configuration with every settle delay set to zero.
    pub fn without_delays(mut self) -> Self {
        self.auth.grant_delay_ms = 0;
        self.auth.factor_delays_ms = FactorDelays {
            biometric: 0,
            retinal: 0,
            voice: 0,
        };
        self.vault.toggle_delay_ms = 0;
        self
    }
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML for [`Config`] or fails
/// validation.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents).context("failed to parse config")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config at {}", path.display()))
}

/// Load `~/.vaultguard/config.toml`, falling back to defaults when it is absent.
///
/// # Errors
///
/// Returns an error if the home directory cannot be resolved or an existing
/// file is invalid.
pub fn load_default_config() -> anyhow::Result<Config> {
    let path = default_config_path()?;
    if path.exists() {
        load_config(&path)
    } else {
        Ok(Config::default())
    }
}

/// Resolve the default config directory (`~/.vaultguard/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".vaultguard"))
}

/// Resolve the default config file path.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}
