//! Read-only views published to presentation.

use serde::Serialize;

use crate::auth::AuthProgress;
use crate::ledger::AccessLogEntry;
use crate::types::SecurityStatus;

/// Where the operator is in the access lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseView {
    /// Authentication sequence in progress.
    Authenticating {
        /// Sequencer progress.
        progress: AuthProgress,
    },
    /// Every factor satisfied; access is about to be granted.
    Granting {
        /// Final sequencer progress.
        progress: AuthProgress,
    },
    /// Access granted; vault controls are live.
    Authenticated,
}

impl PhaseView {
    /// Whether vault controls should be shown.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Sequencer progress while authenticating or granting.
    pub fn progress(&self) -> Option<&AuthProgress> {
        match self {
            Self::Authenticating { progress } | Self::Granting { progress } => Some(progress),
            Self::Authenticated => None,
        }
    }
}

/// State of the vault toggle control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultControl {
    /// Toggle accepts requests.
    Ready,
    /// A toggle is settling; further toggles are rejected.
    Processing,
}

/// Everything presentation renders, published after each processed intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySnapshot {
    /// Aggregate security status.
    pub status: SecurityStatus,
    /// Access lifecycle phase.
    pub phase: PhaseView,
    /// Toggle control state.
    pub vault_control: VaultControl,
    /// Ledger, most recent first.
    pub ledger: Vec<AccessLogEntry>,
}
