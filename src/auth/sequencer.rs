//! Ordered four-factor challenge state machine.
//!
//! The sequencer only tracks progress; it never sleeps. A caller starts a
//! scan, waits the factor's settle delay, then reports the settle back.
//! That keeps the state machine synchronous and testable without a runtime.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::{AuthError, FactorKind, Passcode, PASSCODE_LEN};

/// Proof that an authentication sequence completed.
///
/// Only [`AuthSequencer::submit_passcode`] constructs it, once per sequencer,
/// and granting access consumes it.
#[derive(Debug)]
pub struct Authenticated {
    _private: (),
}

/// Read-only view of sequencer progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthProgress {
    /// One-based step, in `1..=4`.
    pub current_step: u8,
    /// Factors satisfied so far, in sequence order.
    pub completed: Vec<FactorKind>,
    /// Factor whose scan is pending, if any.
    pub scanning: Option<FactorKind>,
    /// Whether all four factors are satisfied.
    pub complete: bool,
}

/// Drives the biometric, retinal, voice, passcode sequence.
#[derive(Debug)]
pub struct AuthSequencer {
    secret: Passcode,
    completed: BTreeSet<FactorKind>,
    current_step: u8,
    scanning: Option<FactorKind>,
}

impl AuthSequencer {
    /// Fresh sequencer at step 1.
    pub fn new(secret: Passcode) -> Self {
        Self {
            secret,
            completed: BTreeSet::new(),
            current_step: 1,
            scanning: None,
        }
    }

    /// One-based current step. Stays at 4 once complete.
    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    /// Whether every factor is satisfied.
    pub fn is_complete(&self) -> bool {
        self.completed.len() == FactorKind::ORDER.len()
    }

    /// Factor the sequence is waiting on, or `None` once complete.
    pub fn expected_factor(&self) -> Option<FactorKind> {
        if self.is_complete() {
            return None;
        }
        FactorKind::at_step(self.current_step)
    }

    /// Whether `kind` has been satisfied.
    pub fn is_factor_complete(&self, kind: FactorKind) -> bool {
        self.completed.contains(&kind)
    }

    /// Factor whose scan is pending.
    pub fn scanning(&self) -> Option<FactorKind> {
        self.scanning
    }

    /// Snapshot of progress for presentation.
    pub fn progress(&self) -> AuthProgress {
        AuthProgress {
            current_step: self.current_step,
            completed: self.completed.iter().copied().collect(),
            scanning: self.scanning,
            complete: self.is_complete(),
        }
    }

    /// Begin the scan for `kind`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ScanInProgress`] if this scan is already pending. Callers
    ///   treat it as a no-op.
    /// - [`AuthError::InvalidFactorOrder`] if `kind` is not the current factor.
    /// - [`AuthError::NotScannable`] for the passcode factor.
    /// - [`AuthError::AlreadyComplete`] once every factor is satisfied.
    pub fn start_factor(&mut self, kind: FactorKind) -> Result<(), AuthError> {
        if self.scanning == Some(kind) {
            return Err(AuthError::ScanInProgress(kind));
        }
        let expected = self.expected_factor().ok_or(AuthError::AlreadyComplete)?;
        if kind != expected {
            return Err(AuthError::InvalidFactorOrder {
                expected,
                requested: kind,
            });
        }
        if !kind.is_scan() {
            return Err(AuthError::NotScannable(kind));
        }
        self.scanning = Some(kind);
        debug!(factor = %kind, step = self.current_step, "scan started");
        Ok(())
    }

    /// Mark the pending scan for `kind` as satisfied and advance one step.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoScanPending`] if `kind` is not the pending scan.
    pub fn settle_scan(&mut self, kind: FactorKind) -> Result<(), AuthError> {
        if self.scanning != Some(kind) {
            return Err(AuthError::NoScanPending(kind));
        }
        self.scanning = None;
        self.complete_current(kind);
        debug!(factor = %kind, step = self.current_step, "scan settled");
        Ok(())
    }

    /// Check a passcode at step 4.
    ///
    /// On success the passcode factor is marked complete and the single
    /// [`Authenticated`] proof for this sequencer is returned.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlreadyComplete`] if the proof was already issued.
    /// - [`AuthError::InvalidFactorOrder`] before the three scans complete.
    /// - [`AuthError::MalformedPasscode`] unless `code` is exactly four characters.
    /// - [`AuthError::PasscodeMismatch`] if `code` differs from the secret.
    pub fn submit_passcode(&mut self, code: &str) -> Result<Authenticated, AuthError> {
        let expected = self.expected_factor().ok_or(AuthError::AlreadyComplete)?;
        if expected != FactorKind::Passcode {
            return Err(AuthError::InvalidFactorOrder {
                expected,
                requested: FactorKind::Passcode,
            });
        }
        let actual = code.chars().count();
        if actual != PASSCODE_LEN {
            return Err(AuthError::MalformedPasscode {
                expected: PASSCODE_LEN,
                actual,
            });
        }
        if !self.secret.matches(code) {
            return Err(AuthError::PasscodeMismatch);
        }
        self.complete_current(FactorKind::Passcode);
        Ok(Authenticated { _private: () })
    }

    fn complete_current(&mut self, kind: FactorKind) {
        self.completed.insert(kind);
        if !self.is_complete() {
            self.current_step = self
                .current_step
                .saturating_add(1)
                .min(FactorKind::Passcode.step());
        }
    }
}
