//! Audio playback through a platform player process.
//!
//! Audio is written to a uniquely named temp file, handed to the player,
//! and the file is removed on every exit path: the `NamedTempFile` guard
//! deletes it when dropped, including on early returns.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::error::VoiceError;

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: &[u8]) -> Result<(), VoiceError>;
}

/// Plays audio by spawning an external player (afplay, ffplay, ...).
pub struct CommandPlayer {
    command: String,
    args: Vec<String>,
    temp_dir: PathBuf,
    volume: f64,
    timeout: Duration,
}

impl CommandPlayer {
    /// `volume` is clamped to `[0, 1]`.
    pub fn new(config: &PlaybackConfig, volume: f64) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            temp_dir: config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            volume: if volume.is_finite() {
                volume.clamp(0.0, 1.0)
            } else {
                1.0
            },
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn render_args(&self, path: &Path) -> Vec<String> {
        let volume = self.volume.to_string();
        let percent = ((self.volume * 100.0).round() as u32).to_string();
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{volume_percent}", &percent)
                    .replace("{volume}", &volume)
                    .replace("{path}", &path)
            })
            .collect()
    }

    fn write_temp(&self, audio: &[u8]) -> Result<NamedTempFile, VoiceError> {
        let mut file = tempfile::Builder::new()
            .prefix("voice-")
            .suffix(".mp3")
            .tempfile_in(&self.temp_dir)
            .map_err(|e| VoiceError::Playback(format!("failed to create temp file: {e}")))?;
        file.write_all(audio)
            .and_then(|()| file.flush())
            .map_err(|e| VoiceError::Playback(format!("failed to write temp file: {e}")))?;
        Ok(file)
    }

    async fn run_player(&self, args: &[String]) -> Result<(), VoiceError> {
        let child = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Playback(format!("failed to spawn {}: {e}", self.command)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Playback(format!(
                    "{} timed out after {}s",
                    self.command,
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| VoiceError::Playback(format!("failed to wait for {}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(VoiceError::Playback(format!(
                "{} exited with code {code}: {}",
                self.command,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, audio: &[u8]) -> Result<(), VoiceError> {
        let temp = self.write_temp(audio)?;
        let args = self.render_args(temp.path());
        debug!("Playing {} bytes via {} {:?}", audio.len(), self.command, args);

        let t0 = Instant::now();
        let result = self.run_player(&args).await;

        let path = temp.path().to_path_buf();
        if let Err(e) = temp.close() {
            warn!("Failed to delete temp audio {}: {e}", path.display());
        }

        if result.is_ok() {
            info!("Playback finished in {}ms", t0.elapsed().as_millis());
        }
        result
    }
}
