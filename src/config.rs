//! Configuration management for voice-notify-rs.
//!
//! Loads config from a YAML file in standard locations, then applies
//! environment overrides (process environment first, `~/.env` second).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8888,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub default_voice_id: Option<String>,
    pub base_url: String,
    pub model_id: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_voice_id: None,
            base_url: "https://api.elevenlabs.io".into(),
            model_id: "eleven_turbo_v2_5".into(),
            timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Audio player executable.
    pub command: String,
    /// Argument template. `{volume}`, `{volume_percent}` and `{path}` are substituted.
    pub args: Vec<String>,
    pub temp_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self {
                command: "/usr/bin/afplay".into(),
                args: vec!["-v".into(), "{volume}".into(), "{path}".into()],
                temp_dir: None,
                timeout_secs: 120,
            }
        } else {
            Self {
                command: "ffplay".into(),
                args: vec![
                    "-nodisp".into(),
                    "-autoexit".into(),
                    "-loglevel".into(),
                    "quiet".into(),
                    "-volume".into(),
                    "{volume_percent}".into(),
                    "{path}".into(),
                ],
                temp_dir: None,
                timeout_secs: 120,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBackend {
    /// AppleScript `display notification` via osascript.
    Osascript,
    /// Freedesktop notification over D-Bus.
    Desktop,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub timeout_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: if cfg!(target_os = "macos") {
                DisplayBackend::Osascript
            } else {
                DisplayBackend::Desktop
            },
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub playback: PlaybackConfig,
    pub display: DisplayConfig,
    pub rate_limit: RateLimitConfig,
    /// Explicit voice registry file; searched under `config_dir` when unset.
    pub registry_path: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./voice-notify.yaml
    /// 2. ~/.config/voice-notify/config.yaml
    /// 3. /etc/voice-notify/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("voice-notify.yaml")),
                dirs::home_dir().map(|h| h.join(".config/voice-notify/config.yaml")),
                Some(PathBuf::from("/etc/voice-notify/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    /// Apply environment overrides. `lookup` returns the value for a variable name.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("ELEVENLABS_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(voice) = non_empty("ELEVENLABS_VOICE_ID") {
            self.provider.default_voice_id = Some(voice);
        }
        let port = non_empty("VOICE_SERVER_PORT").or_else(|| non_empty("PORT"));
        if let Some(port) = port {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(e) => tracing::warn!("Ignoring invalid port {port:?}: {e}"),
            }
        }
        if let Some(dir) = non_empty("PAI_DIR") {
            self.config_dir = Some(PathBuf::from(dir));
        }
    }

    /// Base directory for voice personality files.
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config/pai")
        })
    }

    /// Default voice identifier, `None` when unset or blank.
    pub fn default_voice(&self) -> Option<&str> {
        self.provider
            .default_voice_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Read `KEY=VALUE` lines from `~/.env`. Missing file yields an empty map.
pub fn load_dotenv() -> HashMap<String, String> {
    let Some(path) = dirs::home_dir().map(|h| h.join(".env")) else {
        return HashMap::new();
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let vars = parse_dotenv(&contents);
            debug!("Read {} variables from {}", vars.len(), path.display());
            vars
        }
        Err(_) => HashMap::new(),
    }
}

fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let v = v.trim().trim_matches('"').trim_matches('\'');
            (k.trim().to_string(), v.to_string())
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Environment lookup: process environment first, then the `.env` map.
pub fn env_lookup(dotenv: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}
