//! Visual notifications: AppleScript on macOS, notify-rust (D-Bus) elsewhere.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use notify_rust::Notification;
use tokio::process::Command;
use tracing::debug;

use crate::config::{DisplayBackend, DisplayConfig};
use crate::error::DisplayError;

#[async_trait]
pub trait DisplayNotifier: Send + Sync {
    /// Show a notification. `title` and `message` are already sanitized.
    async fn notify(&self, title: &str, message: &str) -> Result<(), DisplayError>;
}

/// Escape a string for use inside an AppleScript double-quoted literal.
pub fn escape_applescript(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `display notification` via `osascript -e`.
pub struct OsascriptNotifier {
    program: String,
    timeout: Duration,
}

impl OsascriptNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "/usr/bin/osascript".into(),
            timeout,
        }
    }

    pub fn script(title: &str, message: &str) -> String {
        format!(
            "display notification \"{}\" with title \"{}\" sound name \"\"",
            escape_applescript(message),
            escape_applescript(title)
        )
    }
}

#[async_trait]
impl DisplayNotifier for OsascriptNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<(), DisplayError> {
        let script = Self::script(title, message);
        debug!("Notification: {title}");

        let child = Command::new(&self.program)
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DisplayError(format!("failed to spawn {}: {e}", self.program)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DisplayError(format!("{} timed out", self.program)))?
            .map_err(|e| DisplayError(format!("failed to wait for {}: {e}", self.program)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(DisplayError(format!(
                "{} exited with code {:?}: {}",
                self.program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Freedesktop notification over D-Bus.
pub struct DesktopNotifier {
    timeout: Duration,
}

impl DesktopNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DisplayNotifier for DesktopNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<(), DisplayError> {
        debug!("Notification: {title}");
        let (title, message) = (title.to_string(), message.to_string());

        // notify-rust blocks on the D-Bus round trip.
        let show = tokio::task::spawn_blocking(move || {
            Notification::new()
                .summary(&title)
                .body(&message)
                .icon("audio-volume-high")
                .timeout(5000)
                .show()
                .map(|_| ())
        });

        tokio::time::timeout(self.timeout, show)
            .await
            .map_err(|_| DisplayError("desktop notification timed out".into()))?
            .map_err(|e| DisplayError(format!("notification task failed: {e}")))?
            .map_err(|e| DisplayError(e.to_string()))
    }
}

/// Used when display is turned off in config.
pub struct DisabledNotifier;

#[async_trait]
impl DisplayNotifier for DisabledNotifier {
    async fn notify(&self, title: &str, _message: &str) -> Result<(), DisplayError> {
        debug!("Display disabled, skipping notification: {title}");
        Ok(())
    }
}

pub fn from_config(config: &DisplayConfig) -> Box<dyn DisplayNotifier> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.backend {
        DisplayBackend::Osascript => Box::new(OsascriptNotifier::new(timeout)),
        DisplayBackend::Desktop => Box::new(DesktopNotifier::new(timeout)),
        DisplayBackend::Disabled => Box::new(DisabledNotifier),
    }
}
