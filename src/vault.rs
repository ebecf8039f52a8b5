//! Vault lock state machine.
//!
//! Transitions are pure functions from the current [`SecurityStatus`] to a
//! [`Transition`]: the next status plus the ledger event that records it.
//! [`VaultStateMachine`] only tracks the one in-flight toggle.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ledger::LedgerEvent;
use crate::scheduler::OperationId;
use crate::types::{AccessLevel, SecurityStatus};

/// Next status and the ledger event that must be appended with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Status after the intent.
    pub status: SecurityStatus,
    /// Event recording the intent.
    pub event: LedgerEvent,
}

/// Rejected vault intents. None of them change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VaultError {
    /// A toggle is already waiting to settle.
    #[error("vault toggle already in progress")]
    DuplicateToggleRequest,
    /// A settle arrived that does not match the pending toggle.
    #[error("no vault toggle pending for {0}")]
    NoTogglePending(OperationId),
    /// Vault control requires full access.
    #[error("vault control requires authentication")]
    NotAuthenticated,
}

/// Toggle waiting out its settle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingToggle {
    /// Timer driving the settle.
    pub op: OperationId,
    /// Lockdown count observed when the toggle was requested.
    pub lockdown_epoch: u64,
}

/// Result of a settled toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Lock state after the toggle.
    pub locked: bool,
    /// Whether a lockdown during the wait forced the outcome to locked.
    pub superseded: bool,
}

/// Grant full access and open a new session.
pub fn grant_access(status: &SecurityStatus, now: DateTime<Utc>) -> Transition {
    Transition {
        status: SecurityStatus {
            access_level: AccessLevel::Full,
            active_sessions: status.active_sessions.saturating_add(1),
            last_access: now,
            ..*status
        },
        event: LedgerEvent::login(),
    }
}

/// Apply a settled toggle.
///
/// A superseded toggle resolves to locked: a lockdown that happened while it
/// was pending is never undone by it.
pub fn apply_toggle(status: &SecurityStatus, now: DateTime<Utc>, superseded: bool) -> Transition {
    let locked = superseded || !status.vault_locked;
    Transition {
        status: SecurityStatus {
            vault_locked: locked,
            last_access: now,
            ..*status
        },
        event: LedgerEvent::vault_toggled(locked),
    }
}

/// Admission control for the delayed toggle intent.
#[derive(Debug, Default)]
pub struct VaultStateMachine {
    pending: Option<PendingToggle>,
}

impl VaultStateMachine {
    /// No toggle in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a toggle is waiting to settle. Presentation shows "processing".
    pub fn is_processing(&self) -> bool {
        self.pending.is_some()
    }

    /// The in-flight toggle.
    pub fn pending(&self) -> Option<PendingToggle> {
        self.pending
    }

    /// Admit a toggle driven by timer `op`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthenticated`] without full access.
    /// - [`VaultError::DuplicateToggleRequest`] while another toggle is pending.
    pub fn begin_toggle(
        &mut self,
        status: &SecurityStatus,
        op: OperationId,
        lockdown_epoch: u64,
    ) -> Result<(), VaultError> {
        if status.access_level != AccessLevel::Full {
            return Err(VaultError::NotAuthenticated);
        }
        if self.pending.is_some() {
            return Err(VaultError::DuplicateToggleRequest);
        }
        self.pending = Some(PendingToggle { op, lockdown_epoch });
        Ok(())
    }

    /// Release the pending toggle for `op`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoTogglePending`] if `op` is not the pending toggle.
    pub fn finish_toggle(&mut self, op: OperationId) -> Result<PendingToggle, VaultError> {
        match self.pending {
            Some(pending) if pending.op == op => {
                self.pending = None;
                Ok(pending)
            }
            _ => Err(VaultError::NoTogglePending(op)),
        }
    }
}
