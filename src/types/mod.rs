//! Shared status types read by every layer above the core.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access granted to the current operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No successful authentication yet.
    #[default]
    None,
    /// Partial access. Not produced by any current intent.
    Limited,
    /// Full vault access after a completed authentication sequence.
    Full,
}

impl AccessLevel {
    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Limited => "limited",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse escalation indicator. Only emergency lockdown raises it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    /// Normal operation.
    #[default]
    Low,
    /// Elevated. Not produced by any current intent.
    Medium,
    /// Emergency lockdown has been activated.
    High,
}

impl ThreatLevel {
    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Overall posture shown on the status bar.
    pub fn posture(self) -> &'static str {
        match self {
            Self::Low => "SECURE",
            Self::Medium => "CAUTION",
            Self::High => "ALERT",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate security state for one controller session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityStatus {
    /// `true` when the vault is sealed.
    pub vault_locked: bool,
    /// Current operator access level.
    pub access_level: AccessLevel,
    /// Current threat level.
    pub threat_level: ThreatLevel,
    /// Time of the most recent state-mutating intent.
    pub last_access: DateTime<Utc>,
    /// Successful authentications so far. Never decremented.
    pub active_sessions: u32,
}

impl SecurityStatus {
    /// Initial state: no access, low threat, zero sessions.
    pub fn initial(vault_locked: bool, now: DateTime<Utc>) -> Self {
        Self {
            vault_locked,
            access_level: AccessLevel::None,
            threat_level: ThreatLevel::Low,
            last_access: now,
            active_sessions: 0,
        }
    }
}
