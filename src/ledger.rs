//! Append-only access ledger.
//!
//! Entries are prepended, so iteration order is most-recent-first. Once
//! appended an entry is never edited; the only removal is eviction of the
//! oldest entries when a size bound is configured.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Action label for a successful authentication.
pub const ACTION_LOGIN: &str = "Login";
/// Action label for a toggle that left the vault sealed.
pub const ACTION_VAULT_LOCKED: &str = "Vault Locked";
/// Action label for a toggle that left the vault open.
pub const ACTION_VAULT_OPENED: &str = "Vault Opened";
/// Action label for an emergency lockdown.
pub const ACTION_EMERGENCY_LOCKDOWN: &str = "Emergency Lockdown";

/// Actor recorded for operator-initiated intents.
pub const USER_AUTHORIZED: &str = "Authorized User";
/// Actor recorded for system-initiated intents.
pub const USER_SECURITY_SYSTEM: &str = "Security System";

/// Ledger entry identifier.
///
/// Allocated from a per-ledger counter, so two entries appended within the
/// same clock tick still get distinct, ordered ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome label attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogStatus {
    /// Operation succeeded.
    Success,
    /// Check or job finished.
    Complete,
    /// A protective mode was switched on.
    Activated,
    /// Operation failed.
    Failed,
    /// Operation was refused.
    Denied,
    /// Something needs attention.
    Warning,
    /// Any other free-form label.
    Other(String),
}

/// Display severity bucket derived from a [`LogStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Success or completion.
    Ok,
    /// Protective mode engaged.
    Alert,
    /// Needs attention.
    Warning,
    /// Failure or refusal.
    Error,
    /// Unclassified.
    Info,
}

impl LogStatus {
    /// Label as stored in the ledger.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "Success",
            Self::Complete => "Complete",
            Self::Activated => "Activated",
            Self::Failed => "Failed",
            Self::Denied => "Denied",
            Self::Warning => "Warning",
            Self::Other(label) => label,
        }
    }

    /// Severity bucket used by presentation.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Success | Self::Complete => Severity::Ok,
            Self::Failed | Self::Denied => Severity::Error,
            Self::Warning => Severity::Warning,
            Self::Activated => Severity::Alert,
            Self::Other(_) => Severity::Info,
        }
    }
}

impl From<String> for LogStatus {
    fn from(label: String) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "complete" => Self::Complete,
            "activated" => Self::Activated,
            "failed" => Self::Failed,
            "denied" => Self::Denied,
            "warning" => Self::Warning,
            _ => Self::Other(label),
        }
    }
}

impl From<LogStatus> for String {
    fn from(status: LogStatus) -> Self {
        match status {
            LogStatus::Other(label) => label,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event waiting to be stamped and appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    /// Free-form action label.
    pub action: String,
    /// Actor the event is attributed to.
    pub user: String,
    /// Outcome label.
    pub status: LogStatus,
}

impl LedgerEvent {
    /// Build an arbitrary event.
    pub fn new(action: impl Into<String>, user: impl Into<String>, status: LogStatus) -> Self {
        Self {
            action: action.into(),
            user: user.into(),
            status,
        }
    }

    /// Successful login by the authorized operator.
    pub fn login() -> Self {
        Self::new(ACTION_LOGIN, USER_AUTHORIZED, LogStatus::Success)
    }

    /// Vault toggle settled; label follows the new lock state.
    pub fn vault_toggled(locked: bool) -> Self {
        let action = if locked {
            ACTION_VAULT_LOCKED
        } else {
            ACTION_VAULT_OPENED
        };
        Self::new(action, USER_AUTHORIZED, LogStatus::Success)
    }

    /// Emergency lockdown raised by the security system.
    pub fn emergency_lockdown() -> Self {
        Self::new(
            ACTION_EMERGENCY_LOCKDOWN,
            USER_SECURITY_SYSTEM,
            LogStatus::Activated,
        )
    }
}

/// Immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    id: EntryId,
    timestamp: DateTime<Utc>,
    action: String,
    user: String,
    status: LogStatus,
}

impl AccessLogEntry {
    /// Entry identifier.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// When the event was recorded.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Action label.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Attributed actor.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Outcome label.
    pub fn status(&self) -> &LogStatus {
        &self.status
    }
}

/// Reverse-chronological, append-only event record.
#[derive(Debug, Clone, Default)]
pub struct AccessLedger {
    entries: VecDeque<AccessLogEntry>,
    next_id: u64,
    max_entries: Option<NonZeroUsize>,
}

impl AccessLedger {
    /// Create an unbounded, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger that retains at most `max_entries` of the newest entries.
    pub fn bounded(max_entries: NonZeroUsize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::default()
        }
    }

    /// Prepend an event stamped with `timestamp`, returning its id.
    pub fn append(&mut self, event: LedgerEvent, timestamp: DateTime<Utc>) -> EntryId {
        self.next_id = self.next_id.saturating_add(1);
        let id = EntryId(self.next_id);
        self.entries.push_front(AccessLogEntry {
            id,
            timestamp,
            action: event.action,
            user: event.user,
            status: event.status,
        });
        if let Some(max) = self.max_entries {
            self.entries.truncate(max.get());
        }
        id
    }

    /// Pre-populate with the three historical entries a fresh console shows.
    ///
    /// Appended oldest first so the ledger still reads most-recent-first.
    pub fn seed_history(&mut self, now: DateTime<Utc>) {
        let history = [
            (3, "Authentication", "Guard-01", LogStatus::Success),
            (2, "Security Check", "System", LogStatus::Complete),
            (1, "Vault Access", "Admin", LogStatus::Success),
        ];
        for (hours_ago, action, user, status) in history {
            let at = now
                .checked_sub_signed(Duration::hours(hours_ago))
                .unwrap_or(now);
            self.append(LedgerEvent::new(action, user, status), at);
        }
    }

    /// All retained entries, most recent first.
    pub fn all(&self) -> impl ExactSizeIterator<Item = &AccessLogEntry> + '_ {
        self.entries.iter()
    }

    /// Owned copy of all retained entries, most recent first.
    pub fn to_vec(&self) -> Vec<AccessLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&AccessLogEntry> {
        self.entries.front()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One JSON object per line, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry fails to serialize.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        entries_to_json_lines(self.entries.iter())
    }
}

/// Serialize entries as JSON lines, each terminated by `\n`.
///
/// # Errors
///
/// Returns an error if an entry fails to serialize.
pub fn entries_to_json_lines<'a, I>(entries: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = &'a AccessLogEntry>,
{
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}
