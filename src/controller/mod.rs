//! Controller runtime: the single logical thread that owns all state.
//!
//! [`Controller::spawn`] starts a Tokio task that owns the
//! [`SecurityStateStore`], the current authentication phase, and the
//! [`Scheduler`]. Presentation talks to it through a [`ControllerHandle`]:
//! intents go in over an mpsc channel and are processed one at a time,
//! snapshots come out over a watch channel, and discrete notices (passcode
//! rejected, authenticated, ...) over a broadcast channel.
//!
//! Due timers are always drained before the next command, so a settle that
//! is due is applied before any intent queued behind it.

pub mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use snapshot::{PhaseView, SecuritySnapshot, VaultControl};

use crate::auth::{AuthError, AuthProgress, AuthSequencer, Authenticated, FactorKind};
use crate::clock::Clock;
use crate::config::{Config, FactorDelays};
use crate::ledger::AccessLogEntry;
use crate::scheduler::{sleep_until_deadline, OperationId, ScheduledTask, Scheduler};
use crate::store::{SecurityStateStore, StoreOptions};
use crate::types::SecurityStatus;
use crate::vault::VaultError;

/// Command channel buffer size.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Notice channel buffer size. Slow subscribers lag rather than block.
const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// Operator intent dispatched by presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Begin the scan for a factor.
    StartAuthFactor(FactorKind),
    /// Submit the passcode at step 4.
    SubmitPasscode(String),
    /// Lock an open vault or open a locked one.
    ToggleVault,
    /// Seal the vault and raise the threat level.
    EmergencyLockdown,
}

impl Intent {
    /// Short name for logs and notices.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartAuthFactor(_) => "start_auth_factor",
            Self::SubmitPasscode(_) => "submit_passcode",
            Self::ToggleVault => "toggle_vault",
            Self::EmergencyLockdown => "emergency_lockdown",
        }
    }
}

/// Discrete event for presentation to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A factor scan began.
    ScanStarted(FactorKind),
    /// A factor was satisfied.
    FactorVerified(FactorKind),
    /// The passcode was wrong. Presentation should clear its input.
    PasscodeRejected,
    /// The passcode was right; access follows after the grant delay.
    PasscodeAccepted,
    /// Access granted.
    Authenticated {
        /// Session count after the grant.
        active_sessions: u32,
    },
    /// A vault toggle began settling.
    ToggleStarted,
    /// A vault toggle settled.
    VaultToggled {
        /// Lock state after the toggle.
        locked: bool,
        /// Whether a lockdown forced the outcome.
        superseded: bool,
    },
    /// Emergency lockdown applied.
    LockdownActivated,
    /// An intent was refused and changed nothing.
    Rejected {
        /// Name of the refused intent.
        intent: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Errors surfaced to handle callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The controller task has stopped.
    #[error("controller has shut down")]
    Closed,
}

#[derive(Debug)]
enum Command {
    Intent(Intent),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
enum Phase {
    Authenticating(AuthSequencer),
    Granting {
        progress: AuthProgress,
        proof: Authenticated,
    },
    Authenticated,
}

/// Settle delays resolved from configuration.
#[derive(Debug, Clone, Copy)]
struct Delays {
    factors: FactorDelays,
    grant: Duration,
    toggle: Duration,
}

impl Delays {
    fn from_config(config: &Config) -> Self {
        Self {
            factors: config.auth.factor_delays_ms,
            grant: config.auth.grant_delay(),
            toggle: config.vault.toggle_delay(),
        }
    }

    /// Passcode entry is never scheduled, so its missing delay reads as zero.
    fn scan(&self, kind: FactorKind) -> Duration {
        self.factors.delay_for(kind).unwrap_or(Duration::ZERO)
    }
}

/// Owns the store and processes intents one at a time.
#[derive(Debug)]
pub struct Controller {
    store: SecurityStateStore,
    phase: Phase,
    scheduler: Scheduler,
    delays: Delays,
    snapshot_tx: watch::Sender<SecuritySnapshot>,
    notice_tx: broadcast::Sender<Notice>,
}

impl Controller {
    /// Spawn the controller task and return a handle to it.
    ///
    /// Must be called from within a Tokio runtime. The task stops once every
    /// handle has been dropped.
    pub fn spawn(config: &Config, clock: Arc<dyn Clock>) -> ControllerHandle {
        let store = SecurityStateStore::new(clock, StoreOptions::from(config));
        let phase = Phase::Authenticating(AuthSequencer::new(config.auth.passcode.clone()));
        Self::spawn_with(store, phase, Delays::from_config(config))
    }

    fn spawn_with(store: SecurityStateStore, phase: Phase, delays: Delays) -> ControllerHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(build_snapshot(&store, &phase));

        let controller = Self {
            store,
            phase,
            scheduler: Scheduler::new(),
            delays,
            snapshot_tx,
            notice_tx: notice_tx.clone(),
        };

        tokio::spawn(controller.run(command_rx));

        ControllerHandle {
            command_tx,
            snapshot_rx,
            notice_tx,
        }
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        info!("controller started");
        loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                biased;
                () = sleep_until_deadline(deadline) => {
                    self.drain_due();
                }
                command = command_rx.recv() => {
                    // A due timer always wins over a queued command.
                    self.drain_due();
                    match command {
                        Some(Command::Intent(intent)) => self.handle_intent(intent),
                        Some(Command::Flush(done)) => {
                            let _ = done.send(());
                        }
                        None => break,
                    }
                }
            }
            self.publish();
        }
        info!(pending = self.scheduler.len(), "controller stopped");
    }

    fn drain_due(&mut self) {
        let now = Instant::now();
        while let Some((op, task)) = self.scheduler.pop_due(now) {
            self.handle_fired(op, task);
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        let name = intent.name();
        debug!(intent = name, "processing intent");
        match intent {
            Intent::StartAuthFactor(kind) => self.start_factor(kind),
            Intent::SubmitPasscode(code) => self.submit_passcode(&code),
            Intent::ToggleVault => self.toggle_vault(),
            Intent::EmergencyLockdown => {
                self.store.emergency_lockdown();
                self.notify(Notice::LockdownActivated);
            }
        }
    }

    fn start_factor(&mut self, kind: FactorKind) {
        let Phase::Authenticating(sequencer) = &mut self.phase else {
            self.reject("start_auth_factor", &AuthError::AlreadyComplete);
            return;
        };
        match sequencer.start_factor(kind) {
            Ok(()) => {
                let delay = self.delays.scan(kind);
                self.scheduler
                    .schedule(delay, ScheduledTask::FactorScan(kind));
                self.notify(Notice::ScanStarted(kind));
            }
            Err(AuthError::ScanInProgress(_)) => {
                debug!(factor = %kind, "duplicate scan request ignored");
            }
            Err(e) => self.reject("start_auth_factor", &e),
        }
    }

    fn submit_passcode(&mut self, code: &str) {
        let Phase::Authenticating(sequencer) = &mut self.phase else {
            self.reject("submit_passcode", &AuthError::AlreadyComplete);
            return;
        };
        match sequencer.submit_passcode(code) {
            Ok(proof) => {
                let progress = sequencer.progress();
                self.phase = Phase::Granting { progress, proof };
                self.scheduler
                    .schedule(self.delays.grant, ScheduledTask::GrantAccess);
                info!("passcode accepted, granting access");
                self.notify(Notice::PasscodeAccepted);
            }
            Err(AuthError::PasscodeMismatch) => {
                warn!("passcode rejected");
                self.notify(Notice::PasscodeRejected);
            }
            Err(e) => self.reject("submit_passcode", &e),
        }
    }

    fn toggle_vault(&mut self) {
        let op = self
            .scheduler
            .schedule(self.delays.toggle, ScheduledTask::VaultToggle);
        match self.store.begin_toggle(op) {
            Ok(()) => self.notify(Notice::ToggleStarted),
            Err(e) => {
                self.scheduler.cancel(op);
                if e == VaultError::DuplicateToggleRequest {
                    debug!("toggle already in progress, request ignored");
                }
                self.reject("toggle_vault", &e);
            }
        }
    }

    fn handle_fired(&mut self, op: OperationId, task: ScheduledTask) {
        debug!(%op, ?task, "timer fired");
        match task {
            ScheduledTask::FactorScan(kind) => {
                if let Phase::Authenticating(sequencer) = &mut self.phase {
                    match sequencer.settle_scan(kind) {
                        Ok(()) => self.notify(Notice::FactorVerified(kind)),
                        Err(e) => warn!(%op, error = %e, "scan settle dropped"),
                    }
                }
            }
            ScheduledTask::GrantAccess => {
                match std::mem::replace(&mut self.phase, Phase::Authenticated) {
                    Phase::Granting { proof, .. } => {
                        self.store.grant_access(proof);
                        let active_sessions = self.store.status().active_sessions;
                        self.notify(Notice::Authenticated { active_sessions });
                    }
                    other => {
                        warn!(%op, "grant fired outside granting phase");
                        self.phase = other;
                    }
                }
            }
            ScheduledTask::VaultToggle => match self.store.settle_toggle(op) {
                Ok(outcome) => self.notify(Notice::VaultToggled {
                    locked: outcome.locked,
                    superseded: outcome.superseded,
                }),
                Err(e) => warn!(%op, error = %e, "toggle settle dropped"),
            },
        }
    }

    fn reject(&self, intent: &'static str, reason: &dyn std::error::Error) {
        debug!(intent, reason = %reason, "intent rejected");
        self.notify(Notice::Rejected {
            intent,
            reason: reason.to_string(),
        });
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.notice_tx.send(notice);
    }

    fn publish(&self) {
        let next = build_snapshot(&self.store, &self.phase);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn build_snapshot(store: &SecurityStateStore, phase: &Phase) -> SecuritySnapshot {
    let phase = match phase {
        Phase::Authenticating(sequencer) => PhaseView::Authenticating {
            progress: sequencer.progress(),
        },
        Phase::Granting { progress, .. } => PhaseView::Granting {
            progress: progress.clone(),
        },
        Phase::Authenticated => PhaseView::Authenticated,
    };
    let vault_control = if store.is_toggle_pending() {
        VaultControl::Processing
    } else {
        VaultControl::Ready
    };
    SecuritySnapshot {
        status: store.status(),
        phase,
        vault_control,
        ledger: store.access_log(),
    }
}

/// Presentation-facing API: dispatch intents, read snapshots.
///
/// Cheap to clone. Intents are fire-and-forget; [`Self::flush`] waits until
/// everything sent so far has been processed.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<SecuritySnapshot>,
    notice_tx: broadcast::Sender<Notice>,
}

impl ControllerHandle {
    /// Dispatch an intent.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the controller task has stopped.
    pub async fn dispatch(&self, intent: Intent) -> Result<(), ControllerError> {
        self.command_tx
            .send(Command::Intent(intent))
            .await
            .map_err(|_| ControllerError::Closed)
    }

    /// Begin the scan for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the controller task has stopped.
    pub async fn start_auth_factor(&self, kind: FactorKind) -> Result<(), ControllerError> {
        self.dispatch(Intent::StartAuthFactor(kind)).await
    }

    /// Submit the passcode.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the controller task has stopped.
    pub async fn submit_passcode(&self, code: impl Into<String>) -> Result<(), ControllerError> {
        self.dispatch(Intent::SubmitPasscode(code.into())).await
    }

    /// Request a vault toggle.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the controller task has stopped.
    pub async fn toggle_vault(&self) -> Result<(), ControllerError> {
        self.dispatch(Intent::ToggleVault).await
    }

    /// Trigger an emergency lockdown.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the controller task has stopped.
    pub async fn emergency_lockdown(&self) -> Result<(), ControllerError> {
        self.dispatch(Intent::EmergencyLockdown).await
    }

    /// Wait until every intent sent before this call has been processed,
    /// then return the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Closed`] if the controller task has stopped.
    pub async fn flush(&self) -> Result<SecuritySnapshot, ControllerError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Flush(done_tx))
            .await
            .map_err(|_| ControllerError::Closed)?;
        done_rx.await.map_err(|_| ControllerError::Closed)?;
        Ok(self.snapshot())
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SecuritySnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Latest security status.
    pub fn security_status(&self) -> SecurityStatus {
        self.snapshot_rx.borrow().status
    }

    /// Latest ledger, most recent first.
    pub fn access_log(&self) -> Vec<AccessLogEntry> {
        self.snapshot_rx.borrow().ledger.clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SecuritySnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to notices emitted from now on.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }
}
