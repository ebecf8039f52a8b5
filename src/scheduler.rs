//! Deadline table for delayed effects.
//!
//! Factor scans, the access grant, and vault toggles all take effect after a
//! fixed settle delay. Each delay is registered here under an
//! [`OperationId`]; the controller loop sleeps until the earliest deadline
//! and pops whatever is due. Deadlines use `tokio::time::Instant`, so a
//! paused test runtime drives them deterministically.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::auth::FactorKind;

/// Identifier of a scheduled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Effect to apply when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// A factor scan settles.
    FactorScan(FactorKind),
    /// Authentication is delivered upward.
    GrantAccess,
    /// A vault toggle settles.
    VaultToggle,
}

#[derive(Debug)]
struct Scheduled {
    deadline: Instant,
    task: ScheduledTask,
}

/// Pending delayed effects keyed by operation id.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    entries: BTreeMap<OperationId, Scheduled>,
}

impl Scheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` to fire after `delay`.
    pub fn schedule(&mut self, delay: Duration, task: ScheduledTask) -> OperationId {
        self.next_id = self.next_id.saturating_add(1);
        let op = OperationId(self.next_id);
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now);
        debug!(%op, ?task, delay_ms = delay.as_millis(), "scheduled");
        self.entries.insert(op, Scheduled { deadline, task });
        op
    }

    /// Drop a pending operation. Returns its task if it had not fired.
    pub fn cancel(&mut self, op: OperationId) -> Option<ScheduledTask> {
        self.entries.remove(&op).map(|s| s.task)
    }

    /// Whether `op` is still pending.
    pub fn is_pending(&self, op: OperationId) -> bool {
        self.entries.contains_key(&op)
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|s| s.deadline).min()
    }

    /// Remove and return the earliest operation due at `now`.
    ///
    /// Ties on deadline resolve in scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Option<(OperationId, ScheduledTask)> {
        let op = self
            .entries
            .iter()
            .filter(|(_, s)| s.deadline <= now)
            .min_by_key(|(op, s)| (s.deadline, **op))
            .map(|(op, _)| *op)?;
        self.entries.remove(&op).map(|s| (op, s.task))
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
