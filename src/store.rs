//! Security state store: the single source of truth for presentation.
//!
//! Owns the [`SecurityStatus`] and the [`AccessLedger`]. Every intent runs
//! through one `&mut self` call that replaces the status and appends the
//! matching ledger entry together, so no reader ever sees one without the
//! other.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::info;

use crate::auth::Authenticated;
use crate::clock::Clock;
use crate::config::Config;
use crate::ledger::{AccessLedger, AccessLogEntry, EntryId};
use crate::scheduler::OperationId;
use crate::threat::ThreatEscalationPolicy;
use crate::types::SecurityStatus;
use crate::vault::{self, ToggleOutcome, Transition, VaultError, VaultStateMachine};

/// Construction options for [`SecurityStateStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Whether the vault starts sealed.
    pub initially_locked: bool,
    /// Ledger size bound. `None` keeps everything.
    pub max_entries: Option<NonZeroUsize>,
    /// Pre-populate the ledger with historical entries.
    pub seed_history: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initially_locked: true,
            max_entries: None,
            seed_history: false,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            initially_locked: config.vault.initially_locked,
            max_entries: NonZeroUsize::new(config.ledger.max_entries),
            seed_history: config.ledger.seed_history,
        }
    }
}

/// Aggregate root over vault, threat policy, and ledger.
#[derive(Debug)]
pub struct SecurityStateStore {
    status: SecurityStatus,
    ledger: AccessLedger,
    vault: VaultStateMachine,
    threat: ThreatEscalationPolicy,
    clock: Arc<dyn Clock>,
}

impl SecurityStateStore {
    /// Build a store reading timestamps from `clock`.
    pub fn new(clock: Arc<dyn Clock>, options: StoreOptions) -> Self {
        let now = clock.now();
        let mut ledger = match options.max_entries {
            Some(max) => AccessLedger::bounded(max),
            None => AccessLedger::new(),
        };
        if options.seed_history {
            ledger.seed_history(now);
        }
        Self {
            status: SecurityStatus::initial(options.initially_locked, now),
            ledger,
            vault: VaultStateMachine::new(),
            threat: ThreatEscalationPolicy::new(),
            clock,
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SecurityStatus {
        self.status
    }

    /// Read-only ledger view.
    pub fn ledger(&self) -> &AccessLedger {
        &self.ledger
    }

    /// Owned copy of the ledger, most recent first.
    pub fn access_log(&self) -> Vec<AccessLogEntry> {
        self.ledger.to_vec()
    }

    /// Whether a vault toggle is waiting to settle.
    pub fn is_toggle_pending(&self) -> bool {
        self.vault.is_processing()
    }

    /// Grant full access for a completed authentication.
    pub fn grant_access(&mut self, _proof: Authenticated) -> EntryId {
        let transition = vault::grant_access(&self.status, self.clock.now());
        let id = self.commit(transition);
        info!(
            sessions = self.status.active_sessions,
            entry = %id,
            "access granted"
        );
        id
    }

    /// Admit a vault toggle whose effect is applied by [`Self::settle_toggle`].
    ///
    /// Status and ledger are untouched until the toggle settles.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotAuthenticated`] without full access.
    /// - [`VaultError::DuplicateToggleRequest`] while another toggle is pending.
    pub fn begin_toggle(&mut self, op: OperationId) -> Result<(), VaultError> {
        self.vault
            .begin_toggle(&self.status, op, self.threat.epoch())
    }

    /// Apply the pending toggle for `op`.
    ///
    /// If an emergency lockdown happened since the toggle was admitted the
    /// vault stays sealed and the entry records "Vault Locked".
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoTogglePending`] if `op` is not pending.
    pub fn settle_toggle(&mut self, op: OperationId) -> Result<ToggleOutcome, VaultError> {
        let pending = self.vault.finish_toggle(op)?;
        let superseded = self.threat.superseded_since(pending.lockdown_epoch);
        let transition = vault::apply_toggle(&self.status, self.clock.now(), superseded);
        let id = self.commit(transition);
        let outcome = ToggleOutcome {
            locked: self.status.vault_locked,
            superseded,
        };
        info!(
            locked = outcome.locked,
            superseded,
            entry = %id,
            "vault toggle settled"
        );
        Ok(outcome)
    }

    /// Seal the vault and raise the threat level. Always accepted.
    pub fn emergency_lockdown(&mut self) -> EntryId {
        let transition = self.threat.emergency_lockdown(&self.status, self.clock.now());
        let id = self.commit(transition);
        info!(
            epoch = self.threat.epoch(),
            toggle_pending = self.vault.is_processing(),
            entry = %id,
            "emergency lockdown activated"
        );
        id
    }

    fn commit(&mut self, transition: Transition) -> EntryId {
        self.status = transition.status;
        self.ledger.append(transition.event, self.status.last_access)
    }
}
