//! Threat escalation policy.
//!
//! Emergency lockdown is the only intent that raises the threat level, and
//! nothing lowers it again.

use chrono::{DateTime, Utc};

use crate::ledger::LedgerEvent;
use crate::types::{SecurityStatus, ThreatLevel};
use crate::vault::Transition;

/// Seal the vault and raise the threat level to high. Idempotent on state.
pub fn lockdown(status: &SecurityStatus, now: DateTime<Utc>) -> Transition {
    Transition {
        status: SecurityStatus {
            vault_locked: true,
            threat_level: ThreatLevel::High,
            last_access: now,
            ..*status
        },
        event: LedgerEvent::emergency_lockdown(),
    }
}

/// Counts lockdowns so a delayed toggle can tell whether it was overtaken.
#[derive(Debug, Default)]
pub struct ThreatEscalationPolicy {
    epoch: u64,
}

impl ThreatEscalationPolicy {
    /// No lockdowns yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lockdowns so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a lockdown happened after `epoch` was observed.
    pub fn superseded_since(&self, epoch: u64) -> bool {
        self.epoch != epoch
    }

    /// Record a lockdown and return its transition.
    pub fn emergency_lockdown(&mut self, status: &SecurityStatus, now: DateTime<Utc>) -> Transition {
        self.epoch = self.epoch.saturating_add(1);
        lockdown(status, now)
    }
}
