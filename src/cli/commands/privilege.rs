use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use serde_json::json;
use tracing::{error, info};

use crate::cli::utils::{output_outcome, output_success};
use crate::cli::OutputFormat;
use crate::elevation::{ElevationService, LockState, RollbackOutcome, SweepOutcome};

pub async fn sweep(service: &ElevationService, output_format: OutputFormat) -> anyhow::Result<()> {
    let outcome = service.sweep()?;
    let message = match outcome {
        SweepOutcome::Idle => "No active privilege window".to_string(),
        SweepOutcome::Pending { remaining_secs } => format!("Privilege window open ({}s remaining)", remaining_secs),
        SweepOutcome::RolledBack { activated_at } => format!("Rolled back activation from {}", activated_at),
    };
    output_success(&output_format, &message, Some(json!({ "sweep": outcome })))
}

pub async fn status(service: &ElevationService, session: Option<&str>, output_format: OutputFormat) -> anyhow::Result<()> {
    if let Some(session) = session {
        return output_outcome(&output_format, service.status(session).await);
    }

    let state = service.activator().state()?;
    let message = match state {
        LockState::Inactive => "Privilege inactive".to_string(),
        LockState::Active { remaining_secs, .. } => format!("Privilege active ({}s remaining)", remaining_secs),
        LockState::Stale { activated_at } => format!("Privilege window from {} elapsed, run `enginex sweep`", activated_at),
    };
    output_success(&output_format, &message, Some(json!({ "activation": state })))
}

pub async fn activate(
    service: &ElevationService,
    session: &str,
    user: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let outcome = service.activate_privilege(session, user).await;
    if outcome.success {
        // The in-process timer dies with this command; hand the deadline to a
        // background sweep or take the privilege straight back
        let delay = service.activator().scheduler().duration_secs().max(0) as u64 + 1;
        if let Err(e) = arm_detached_sweep(delay) {
            error!("Cannot arm background rollback, reverting: {:#}", e);
            let activator = service.activator().clone();
            tokio::task::spawn_blocking(move || activator.deactivate()).await??;
            anyhow::bail!("activation reverted: no background rollback could be armed");
        }
    }
    output_outcome(&output_format, outcome)
}

/// `enginex sweep --after <delay>` in its own process group with no stdio,
/// so it survives this command and the terminal it ran in
pub fn detached_sweep_command(exe: &Path, delay_secs: u64) -> Command {
    let mut command = Command::new(exe);
    command
        .arg("sweep")
        .arg("--after")
        .arg(delay_secs.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command
}

fn arm_detached_sweep(delay_secs: u64) -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("cannot locate the enginex executable")?;
    let child = detached_sweep_command(&exe, delay_secs)
        .spawn()
        .with_context(|| format!("cannot spawn {}", exe.display()))?;
    info!("Background rollback armed (pid {}, {}s)", child.id(), delay_secs);
    Ok(())
}

/// Operator-side early revocation; unlike the HTTP route it needs no grant
pub async fn deactivate(service: &ElevationService, output_format: OutputFormat) -> anyhow::Result<()> {
    let activator = service.activator().clone();
    let outcome = tokio::task::spawn_blocking(move || activator.deactivate()).await??;
    let message = match outcome {
        RollbackOutcome::RolledBack => "Privileges disabled",
        _ => "Privileges were not active",
    };
    output_success(&output_format, message, Some(json!({ "outcome": outcome })))
}
