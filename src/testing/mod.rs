use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::elevation::clock::{ManualClock, SharedClock};
use crate::elevation::{ElevationError, ElevationService, PrivilegeToggle, ToggleSnapshot};
use crate::notify::NotificationChannel;

/// In-memory privilege toggle that counts calls and can be told to fail
#[derive(Debug)]
pub struct RecordingToggle {
    enabled: AtomicBool,
    target_exists: AtomicBool,
    fail_enable: AtomicBool,
    fail_disable: AtomicBool,
    validation_error: Mutex<Option<String>>,
    enable_calls: AtomicUsize,
    disable_calls: AtomicUsize,
    restore_calls: AtomicUsize,
    validate_calls: AtomicUsize,
}

impl Default for RecordingToggle {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            target_exists: AtomicBool::new(true),
            fail_enable: AtomicBool::new(false),
            fail_disable: AtomicBool::new(false),
            validation_error: Mutex::new(None),
            enable_calls: AtomicUsize::new(0),
            disable_calls: AtomicUsize::new(0),
            restore_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
        }
    }
}

impl RecordingToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    pub fn disable_calls(&self) -> usize {
        self.disable_calls.load(Ordering::SeqCst)
    }

    pub fn restore_calls(&self) -> usize {
        self.restore_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn set_target_exists(&self, exists: bool) {
        self.target_exists.store(exists, Ordering::SeqCst);
    }

    pub fn fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::SeqCst);
    }

    pub fn fail_disable(&self, fail: bool) {
        self.fail_disable.store(fail, Ordering::SeqCst);
    }

    /// `Some(diagnostic)` makes every following `validate` fail with it
    pub fn fail_validation(&self, diagnostic: Option<&str>) {
        if let Ok(mut slot) = self.validation_error.lock() {
            *slot = diagnostic.map(str::to_string);
        }
    }
}

impl PrivilegeToggle for RecordingToggle {
    fn target_exists(&self) -> bool {
        self.target_exists.load(Ordering::SeqCst)
    }

    fn target(&self) -> PathBuf {
        PathBuf::from("recording")
    }

    fn enable(&self) -> Result<(), ElevationError> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(ElevationError::ToggleFailed("enable refused".to_string()));
        }
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) -> Result<(), ElevationError> {
        self.disable_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disable.load(Ordering::SeqCst) {
            return Err(ElevationError::ToggleFailed("disable refused".to_string()));
        }
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn snapshot(&self) -> Result<ToggleSnapshot, ElevationError> {
        Ok(ToggleSnapshot::Flag(self.is_enabled()))
    }

    /// Shares the `fail_disable` switch: both are the revert path
    fn restore(&self, snapshot: &ToggleSnapshot) -> Result<(), ElevationError> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disable.load(Ordering::SeqCst) {
            return Err(ElevationError::ToggleFailed("restore refused".to_string()));
        }
        self.enabled
            .store(matches!(snapshot, ToggleSnapshot::Flag(true)), Ordering::SeqCst);
        Ok(())
    }

    fn validate(&self) -> Result<(), ElevationError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        let diagnostic = self.validation_error.lock().ok().and_then(|slot| slot.clone());
        match diagnostic {
            Some(diagnostic) => Err(ElevationError::SyntaxValidationFailed(diagnostic)),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        "recording toggle".to_string()
    }
}

/// Notification channel that keeps every message it was asked to send
#[derive(Debug, Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages are still recorded, but `send` reports failure
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.fail.store(true, Ordering::SeqCst);
        channel
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Last six-character code mentioned in a sent message
    pub fn last_code(&self) -> Option<String> {
        self.messages().iter().rev().find_map(|message| {
            message
                .split('`')
                .find(|part| crate::elevation::challenge::is_well_formed(part))
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, message: &str) -> bool {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
        !self.fail.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A complete elevation service over a temp directory, a manual clock and
/// recording collaborators
pub struct TestContext {
    pub dir: tempfile::TempDir,
    pub clock: ManualClock,
    pub toggle: Arc<RecordingToggle>,
    pub channel: Arc<RecordingChannel>,
    pub service: ElevationService,
}

impl TestContext {
    pub const START: i64 = 1_700_000_000;

    pub fn new() -> anyhow::Result<Self> {
        Self::with_channel(RecordingChannel::new())
    }

    pub fn with_channel(channel: RecordingChannel) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let clock = ManualClock::new(Self::START);
        let toggle = Arc::new(RecordingToggle::new());
        let channel = Arc::new(channel);

        let mut config = crate::config::AppConfig::development();
        config.storage.data_dir = dir.path().to_path_buf();

        let shared: SharedClock = Arc::new(clock.clone());
        let service = ElevationService::builder(&config)
            .clock(shared)
            .toggle(toggle.clone())
            .notifier(channel.clone())
            .build()?;

        Ok(Self {
            dir,
            clock,
            toggle,
            channel,
            service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_channel_extracts_code() {
        let channel = RecordingChannel::new();
        assert!(channel.send("Your code: `AB12CD` (valid 5 min)").await);
        assert_eq!(channel.last_code().as_deref(), Some("AB12CD"));
    }

    #[tokio::test]
    async fn failing_channel_still_records() {
        let channel = RecordingChannel::failing();
        assert!(!channel.send("hello").await);
        assert_eq!(channel.messages(), vec!["hello".to_string()]);
    }

    #[test]
    fn recording_toggle_counts_and_fails_on_request() {
        let toggle = RecordingToggle::new();
        toggle.enable().unwrap();
        assert!(toggle.is_enabled());

        toggle.fail_validation(Some("bad"));
        assert!(matches!(toggle.validate(), Err(ElevationError::SyntaxValidationFailed(_))));
        toggle.fail_validation(None);
        assert!(toggle.validate().is_ok());
        assert_eq!(toggle.validate_calls(), 2);
    }
}
