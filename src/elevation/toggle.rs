use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::error::ElevationError;
use crate::config::PrivilegeConfig;

pub const STATUS_ENABLED: &str = "# TEMPORALES - ACTIVOS";
pub const STATUS_DISABLED: &str = "# TEMPORALES - DESHABILITADOS";

/// The system-level privilege switch flipped by activation and rollback
pub trait PrivilegeToggle: Send + Sync {
    /// Whether the privilege configuration the toggle edits is present
    fn target_exists(&self) -> bool;

    fn target(&self) -> PathBuf;

    fn enable(&self) -> Result<(), ElevationError>;

    fn disable(&self) -> Result<(), ElevationError>;

    /// Capture the configuration as it is now, before `enable` touches it
    fn snapshot(&self) -> Result<ToggleSnapshot, ElevationError>;

    /// Put a snapshot back verbatim. Used when an activation fails half-way.
    fn restore(&self, snapshot: &ToggleSnapshot) -> Result<(), ElevationError>;

    /// Run the target system's own syntax check.
    /// Fails with `SyntaxValidationFailed` carrying the checker's output.
    fn validate(&self) -> Result<(), ElevationError>;

    fn describe(&self) -> String;
}

/// What a toggle looked like before an activation started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleSnapshot {
    /// Exact content of the privilege file
    Content(String),
    /// State of a toggle with no backing file
    Flag(bool),
}

/// Settings for the sudoers-backed toggle
#[derive(Debug, Clone)]
pub struct SudoersSettings {
    pub path: PathBuf,
    pub block_start: String,
    pub block_end: String,
    pub rule_user: String,
    pub validate_command: String,
    pub use_sudo: bool,
}

impl From<&PrivilegeConfig> for SudoersSettings {
    fn from(config: &PrivilegeConfig) -> Self {
        Self {
            path: config.sudoers_path.clone(),
            block_start: config.block_start.clone(),
            block_end: config.block_end.clone(),
            rule_user: config.rule_user.clone(),
            validate_command: config.validate_command.clone(),
            use_sudo: config.use_sudo,
        }
    }
}

/// Edits the delimited temporary block of a sudoers drop-in.
///
/// Only lines strictly between the start and end markers are touched:
/// rule lines for `rule_user` are commented or uncommented and the status
/// comment is rewritten. Everything else is written back byte for byte.
pub struct SudoersToggle {
    settings: SudoersSettings,
}

impl SudoersToggle {
    pub fn new(settings: SudoersSettings) -> Self {
        Self { settings }
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), ElevationError> {
        let current = self.read_target()?;
        let updated = set_block_state(
            &current,
            &self.settings.block_start,
            &self.settings.block_end,
            &self.settings.rule_user,
            enabled,
        )?;

        if updated == current {
            debug!("Privilege block already {}", if enabled { "enabled" } else { "disabled" });
            return Ok(());
        }
        self.write_target(&updated)
    }

    fn read_target(&self) -> Result<String, ElevationError> {
        let path = &self.settings.path;
        if !self.settings.use_sudo {
            return std::fs::read_to_string(path)
                .map_err(|e| ElevationError::ToggleFailed(format!("cannot read {}: {}", path.display(), e)));
        }

        let output = Command::new("sudo")
            .args(["-n", "/bin/cat"])
            .arg(path)
            .output()
            .map_err(|e| ElevationError::ToggleFailed(format!("cannot run sudo: {}", e)))?;
        if !output.status.success() {
            return Err(ElevationError::ToggleFailed(combined_output(&output)));
        }
        String::from_utf8(output.stdout)
            .map_err(|_| ElevationError::ToggleFailed(format!("{} is not valid UTF-8", path.display())))
    }

    fn write_target(&self, content: &str) -> Result<(), ElevationError> {
        let path = &self.settings.path;
        if self.settings.use_sudo {
            let mut child = Command::new("sudo")
                .args(["-n", "/usr/bin/tee"])
                .arg(path)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| ElevationError::ToggleFailed(format!("cannot run sudo: {}", e)))?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(content.as_bytes())
                    .map_err(|e| ElevationError::ToggleFailed(e.to_string()))?;
            }
            let output = child
                .wait_with_output()
                .map_err(|e| ElevationError::ToggleFailed(e.to_string()))?;
            if !output.status.success() {
                return Err(ElevationError::ToggleFailed(combined_output(&output)));
            }
            return Ok(());
        }

        write_atomic(path, content)
            .map_err(|e| ElevationError::ToggleFailed(format!("cannot write {}: {}", path.display(), e)))
    }

    fn validate_command(&self) -> Option<Command> {
        let path = self.settings.path.to_string_lossy();
        let mut parts = self
            .settings
            .validate_command
            .split_whitespace()
            .map(|part| part.replace("{path}", &path));

        let program = parts.next()?;
        let mut command = if self.settings.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(program);
            c
        } else {
            Command::new(program)
        };
        command.args(parts);
        Some(command)
    }
}

impl PrivilegeToggle for SudoersToggle {
    fn target_exists(&self) -> bool {
        if !self.settings.use_sudo {
            return self.settings.path.is_file();
        }
        Command::new("sudo")
            .args(["-n", "/usr/bin/test", "-f"])
            .arg(&self.settings.path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn target(&self) -> PathBuf {
        self.settings.path.clone()
    }

    fn enable(&self) -> Result<(), ElevationError> {
        self.set_enabled(true)
    }

    fn disable(&self) -> Result<(), ElevationError> {
        self.set_enabled(false)
    }

    fn snapshot(&self) -> Result<ToggleSnapshot, ElevationError> {
        self.read_target().map(ToggleSnapshot::Content)
    }

    fn restore(&self, snapshot: &ToggleSnapshot) -> Result<(), ElevationError> {
        let ToggleSnapshot::Content(previous) = snapshot else {
            return Err(ElevationError::ToggleFailed("snapshot carries no file content".to_string()));
        };
        if self.read_target().ok().as_ref() == Some(previous) {
            return Ok(());
        }
        self.write_target(previous)
    }

    fn validate(&self) -> Result<(), ElevationError> {
        let Some(mut command) = self.validate_command() else {
            return Err(ElevationError::SyntaxValidationFailed("no validate command configured".to_string()));
        };

        let output = command
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ElevationError::SyntaxValidationFailed(format!("cannot run validator: {}", e)))?;
        if !output.status.success() {
            return Err(ElevationError::SyntaxValidationFailed(combined_output(&output)));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sudoers block in {}", self.settings.path.display())
    }
}

/// Logs what would happen without touching the system. For local development.
#[derive(Debug, Default)]
pub struct DryRunToggle {
    enabled: AtomicBool,
}

impl DryRunToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl PrivilegeToggle for DryRunToggle {
    fn target_exists(&self) -> bool {
        true
    }

    fn target(&self) -> PathBuf {
        PathBuf::from("dry-run")
    }

    fn enable(&self) -> Result<(), ElevationError> {
        self.enabled.store(true, Ordering::SeqCst);
        info!("[dry-run] privilege block enabled");
        Ok(())
    }

    fn disable(&self) -> Result<(), ElevationError> {
        self.enabled.store(false, Ordering::SeqCst);
        info!("[dry-run] privilege block disabled");
        Ok(())
    }

    fn snapshot(&self) -> Result<ToggleSnapshot, ElevationError> {
        Ok(ToggleSnapshot::Flag(self.is_enabled()))
    }

    fn restore(&self, snapshot: &ToggleSnapshot) -> Result<(), ElevationError> {
        let enabled = matches!(snapshot, ToggleSnapshot::Flag(true));
        self.enabled.store(enabled, Ordering::SeqCst);
        info!("[dry-run] privilege block restored ({})", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    fn validate(&self) -> Result<(), ElevationError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "dry-run toggle".to_string()
    }
}

/// Rewrite the marker block of `content` into the requested state
pub fn set_block_state(
    content: &str,
    block_start: &str,
    block_end: &str,
    rule_user: &str,
    enabled: bool,
) -> Result<String, ElevationError> {
    let commented_rule = format!("# {}", rule_user);
    let mut out = String::with_capacity(content.len() + 16);
    let mut inside = false;
    let mut saw_start = false;
    let mut saw_end = false;

    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let ending = &line[body.len()..];

        if !inside && !saw_start && body.trim() == block_start {
            inside = true;
            saw_start = true;
            out.push_str(line);
            continue;
        }
        if inside && body.trim() == block_end {
            inside = false;
            saw_end = true;
            out.push_str(line);
            continue;
        }
        if !inside {
            out.push_str(line);
            continue;
        }

        let rewritten = if enabled {
            if let Some(rest) = body.strip_prefix(&commented_rule) {
                format!("{}{}", rule_user, rest)
            } else {
                body.replace(STATUS_DISABLED, STATUS_ENABLED)
            }
        } else if body.starts_with(rule_user) {
            format!("# {}", body)
        } else {
            body.replace(STATUS_ENABLED, STATUS_DISABLED)
        };
        out.push_str(&rewritten);
        out.push_str(ending);
    }

    if !saw_start || !saw_end {
        return Err(ElevationError::ToggleFailed(format!(
            "marker block '{}' .. '{}' not found",
            block_start, block_end
        )));
    }
    Ok(out)
}

/// Temp file in the same directory, permissions copied, then rename
pub(crate) fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn combined_output(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let text = text.trim();
    if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text.to_string()
    }
}
