//! Line-oriented console presentation.
//!
//! A thin collaborator over [`ControllerHandle`]: it renders snapshots and
//! notices as text and turns typed commands into intents. It never touches
//! the store directly.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, LinesStream};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::auth::{AuthError, FactorKind};
use crate::controller::{ControllerHandle, Notice, PhaseView, SecuritySnapshot, VaultControl};
use crate::ledger::{entries_to_json_lines, AccessLogEntry, Severity};

/// Help text printed by `help`.
pub const HELP: &str = "\
commands:
  scan <biometric|retinal|voice>  start the next factor scan
  passcode <code>                 submit the 4-character passcode
  toggle                          lock or unlock the vault
  lockdown                        emergency lockdown
  status                          show security status
  log [--json]                    show the access log
  help                            show this help
  quit                            exit";

/// Parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start a factor scan.
    Scan(FactorKind),
    /// Submit a passcode.
    Passcode(String),
    /// Toggle the vault.
    Toggle,
    /// Emergency lockdown.
    Lockdown,
    /// Print the status panel.
    Status,
    /// Print the access log.
    Log {
        /// Emit JSON lines instead of a table.
        json: bool,
    },
    /// Print help.
    Help,
    /// Leave the console.
    Quit,
}

/// Console input that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    /// Blank line.
    #[error("empty command")]
    Empty,
    /// First word is not a command.
    #[error("unknown command: {0}")]
    Unknown(String),
    /// Command needs an argument.
    #[error("{0} requires an argument")]
    MissingArgument(&'static str),
    /// Argument is not a factor.
    #[error(transparent)]
    Factor(#[from] AuthError),
}

impl FromStr for ConsoleCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(ParseCommandError::Empty)?;
        match head.to_ascii_lowercase().as_str() {
            "scan" => {
                let factor = words.next().ok_or(ParseCommandError::MissingArgument("scan"))?;
                Ok(Self::Scan(factor.parse()?))
            }
            "passcode" | "code" => {
                let code = words
                    .next()
                    .ok_or(ParseCommandError::MissingArgument("passcode"))?;
                Ok(Self::Passcode(code.to_owned()))
            }
            "toggle" => Ok(Self::Toggle),
            "lockdown" => Ok(Self::Lockdown),
            "status" => Ok(Self::Status),
            "log" => Ok(Self::Log {
                json: words.any(|w| w == "--json"),
            }),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseCommandError::Unknown(other.to_owned())),
        }
    }
}

/// Render the status panel.
pub fn render_status(snapshot: &SecuritySnapshot) -> String {
    let status = &snapshot.status;
    let mut out = String::new();
    match &snapshot.phase {
        PhaseView::Authenticating { progress } | PhaseView::Granting { progress } => {
            let _ = writeln!(out, "Vault Access: multi-factor authentication required");
            for kind in FactorKind::ORDER {
                let mark = if progress.completed.contains(&kind) {
                    "done"
                } else if progress.scanning == Some(kind) {
                    "scanning"
                } else if kind.step() == progress.current_step {
                    "current"
                } else {
                    "pending"
                };
                let _ = writeln!(out, "  [{}] {:<9} {mark}", kind.step(), kind.as_str());
            }
            if progress.complete {
                let _ = writeln!(out, "Authentication complete. Granting vault access...");
            }
        }
        PhaseView::Authenticated => {
            let vault = if status.vault_locked {
                "SECURED"
            } else {
                "ACCESSIBLE"
            };
            let control = match snapshot.vault_control {
                VaultControl::Processing => "Processing...",
                VaultControl::Ready if status.vault_locked => "Unlock Vault",
                VaultControl::Ready => "Lock Vault",
            };
            let _ = writeln!(out, "Vault Status: {vault}");
            let _ = writeln!(
                out,
                "Access Level: {}",
                status.access_level.as_str().to_uppercase()
            );
            let _ = writeln!(out, "Control: {control}");
        }
    }
    let _ = writeln!(
        out,
        "Threat Level: {} ({})",
        status.threat_level,
        status.threat_level.posture()
    );
    let _ = writeln!(out, "Active Sessions: {}", status.active_sessions);
    let _ = write!(
        out,
        "Last Access: {}",
        status.last_access.format("%H:%M:%S")
    );
    out
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "ok",
        Severity::Alert => "alert",
        Severity::Warning => "warn",
        Severity::Error => "error",
        Severity::Info => "info",
    }
}

/// Render ledger entries as a table, most recent first.
pub fn render_ledger(entries: &[AccessLogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{:>4}  {}  {:<5}  {:<20} {:<16} {}",
            entry.id(),
            entry.timestamp().format("%H:%M:%S"),
            severity_tag(entry.status().severity()),
            entry.action(),
            entry.user(),
            entry.status()
        );
    }
    let _ = write!(out, "Total Entries: {}", entries.len());
    out
}

/// One-line description of a notice.
pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::ScanStarted(kind) => format!("{kind} scan started"),
        Notice::FactorVerified(kind) => format!("{kind} verified"),
        Notice::PasscodeRejected => "invalid passcode, input cleared".to_owned(),
        Notice::PasscodeAccepted => "passcode accepted, granting vault access".to_owned(),
        Notice::Authenticated { active_sessions } => {
            format!("access granted ({active_sessions} active sessions)")
        }
        Notice::ToggleStarted => "vault processing...".to_owned(),
        Notice::VaultToggled { locked, superseded } => {
            let state = if *locked { "locked" } else { "opened" };
            if *superseded {
                format!("vault {state} (lockdown in effect)")
            } else {
                format!("vault {state}")
            }
        }
        Notice::LockdownActivated => "EMERGENCY LOCKDOWN ACTIVATED".to_owned(),
        Notice::Rejected { intent, reason } => format!("{intent} rejected: {reason}"),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> anyhow::Result<()> {
    writer
        .write_all(text.as_bytes())
        .await
        .context("failed to write console output")?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Run the interactive console until `quit` or end of input.
///
/// Notices are printed as they arrive, interleaved with command output.
///
/// # Errors
///
/// Returns an error if input cannot be read, output cannot be written, or the
/// controller shuts down.
pub async fn run_console<R, W>(handle: &ControllerHandle, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut notices = BroadcastStream::new(handle.notices());

    write_line(&mut writer, &render_status(&handle.snapshot())).await?;
    write_line(&mut writer, "type `help` for commands").await?;

    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                let line = line.context("failed to read console input")?;
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => execute(handle, command, &mut writer).await?,
                    Err(e) => write_line(&mut writer, &e.to_string()).await?,
                }
            }
            Some(notice) = notices.next() => match notice {
                Ok(notice) => write_line(&mut writer, &format!("* {}", render_notice(&notice))).await?,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "console fell behind on notices");
                }
            },
        }
    }
    debug!("console closed");
    Ok(())
}

async fn execute<W: AsyncWrite + Unpin>(
    handle: &ControllerHandle,
    command: ConsoleCommand,
    writer: &mut W,
) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::Scan(kind) => handle.start_auth_factor(kind).await?,
        ConsoleCommand::Passcode(code) => handle.submit_passcode(code).await?,
        ConsoleCommand::Toggle => handle.toggle_vault().await?,
        ConsoleCommand::Lockdown => handle.emergency_lockdown().await?,
        ConsoleCommand::Status => {
            let snapshot = handle.flush().await?;
            write_line(writer, &render_status(&snapshot)).await?;
        }
        ConsoleCommand::Log { json: true } => {
            let snapshot = handle.flush().await?;
            let lines = entries_to_json_lines(&snapshot.ledger)
                .context("failed to serialize access log")?;
            writer
                .write_all(lines.as_bytes())
                .await
                .context("failed to write console output")?;
            writer.flush().await?;
        }
        ConsoleCommand::Log { json: false } => {
            let snapshot = handle.flush().await?;
            write_line(writer, &render_ledger(&snapshot.ledger)).await?;
        }
        ConsoleCommand::Help => write_line(writer, HELP).await?,
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// Walk through the full flow: three scans, passcode, unlock, lockdown.
///
/// Waits on notices rather than sleeping, so it finishes as soon as the
/// configured delays allow.
///
/// # Errors
///
/// Returns an error if output cannot be written or the controller stops.
pub async fn run_demo<W: AsyncWrite + Unpin>(
    handle: &ControllerHandle,
    passcode: &str,
    mut writer: W,
) -> anyhow::Result<()> {
    let mut notices = handle.notices();

    for kind in FactorKind::ORDER.into_iter().filter(|k| k.is_scan()) {
        handle.start_auth_factor(kind).await?;
        wait_for(&mut notices, &mut writer, |n| *n == Notice::FactorVerified(kind)).await?;
    }

    handle.submit_passcode(passcode).await?;
    wait_for(&mut notices, &mut writer, |n| {
        matches!(
            n,
            Notice::Authenticated { .. } | Notice::PasscodeRejected | Notice::Rejected { .. }
        )
    })
    .await?;

    if handle.flush().await?.phase.is_authenticated() {
        handle.toggle_vault().await?;
        wait_for(&mut notices, &mut writer, |n| {
            matches!(n, Notice::VaultToggled { .. })
        })
        .await?;
        handle.emergency_lockdown().await?;
        wait_for(&mut notices, &mut writer, |n| *n == Notice::LockdownActivated).await?;
    }

    let snapshot = handle.flush().await?;
    write_line(&mut writer, &render_status(&snapshot)).await?;
    write_line(&mut writer, &render_ledger(&snapshot.ledger)).await?;
    Ok(())
}

async fn wait_for<W, F>(
    notices: &mut tokio::sync::broadcast::Receiver<Notice>,
    writer: &mut W,
    done: F,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    F: Fn(&Notice) -> bool,
{
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match notices.recv().await {
            Ok(notice) => {
                write_line(writer, &format!("* {}", render_notice(&notice))).await?;
                if done(&notice) {
                    return Ok(());
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "demo fell behind on notices"),
            Err(RecvError::Closed) => anyhow::bail!("controller closed while waiting"),
        }
    }
}
