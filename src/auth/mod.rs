//! Multi-factor authentication sequencing.
//!
//! Four factors must be satisfied strictly in order: biometric, retinal,
//! voice, then passcode. The three scans are simulated and always succeed
//! after their settle delay; the passcode is checked against the configured
//! secret. See [`sequencer::AuthSequencer`].

pub mod sequencer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sequencer::{AuthProgress, AuthSequencer, Authenticated};

/// Number of characters a passcode must have.
pub const PASSCODE_LEN: usize = 4;

/// Default passcode secret.
pub const DEFAULT_PASSCODE: &str = "2025";

/// One step of the authentication sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// Fingerprint scan.
    Biometric,
    /// Retinal scan.
    Retinal,
    /// Voice recognition.
    Voice,
    /// Secret passcode entry.
    Passcode,
}

impl FactorKind {
    /// Factors in the order they must be satisfied.
    pub const ORDER: [FactorKind; 4] = [
        FactorKind::Biometric,
        FactorKind::Retinal,
        FactorKind::Voice,
        FactorKind::Passcode,
    ];

    /// One-based step number of this factor.
    pub fn step(self) -> u8 {
        match self {
            Self::Biometric => 1,
            Self::Retinal => 2,
            Self::Voice => 3,
            Self::Passcode => 4,
        }
    }

    /// Factor for a one-based step number.
    pub fn at_step(step: u8) -> Option<Self> {
        match step {
            1 => Some(Self::Biometric),
            2 => Some(Self::Retinal),
            3 => Some(Self::Voice),
            4 => Some(Self::Passcode),
            _ => None,
        }
    }

    /// Whether this factor is satisfied by a timed scan.
    pub fn is_scan(self) -> bool {
        !matches!(self, Self::Passcode)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Biometric => "biometric",
            Self::Retinal => "retinal",
            Self::Voice => "voice",
            Self::Passcode => "passcode",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactorKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "biometric" | "fingerprint" => Ok(Self::Biometric),
            "retinal" | "retina" => Ok(Self::Retinal),
            "voice" => Ok(Self::Voice),
            "passcode" => Ok(Self::Passcode),
            other => Err(AuthError::UnknownFactor(other.to_owned())),
        }
    }
}

/// Reasons an authentication intent is rejected.
///
/// Every rejection leaves the sequencer unchanged and is safe to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// A factor was started before its predecessors completed, or after it
    /// already completed.
    #[error("{requested} started out of order, expected {expected}")]
    InvalidFactorOrder {
        /// Factor at the current step.
        expected: FactorKind,
        /// Factor that was requested.
        requested: FactorKind,
    },
    /// The scan for this factor is already pending.
    #[error("{0} scan already in progress")]
    ScanInProgress(FactorKind),
    /// The factor is not satisfied by a scan.
    #[error("{0} is entered, not scanned")]
    NotScannable(FactorKind),
    /// A settle arrived for a scan that is not pending.
    #[error("no {0} scan pending")]
    NoScanPending(FactorKind),
    /// Submitted passcode does not match the secret.
    #[error("invalid passcode")]
    PasscodeMismatch,
    /// Submitted passcode has the wrong length.
    #[error("passcode must be {expected} characters, got {actual}")]
    MalformedPasscode {
        /// Required length.
        expected: usize,
        /// Submitted length.
        actual: usize,
    },
    /// All factors are already satisfied.
    #[error("authentication already complete")]
    AlreadyComplete,
    /// Name did not match any factor.
    #[error("unknown factor: {0}")]
    UnknownFactor(String),
}

/// Passcode secret.
///
/// Debug output is always `__REDACTED__` so the secret never reaches logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Passcode(String);

impl Passcode {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Exact comparison against a submitted code.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

impl Default for Passcode {
    fn default() -> Self {
        Self::new(DEFAULT_PASSCODE)
    }
}

impl fmt::Debug for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("__REDACTED__")
    }
}
