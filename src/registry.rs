//! Voice personality registry.
//!
//! Loaded once at startup from `voice-personalities.md` (first ```json
//! block) or `voice-personalities.json`. Read-only afterwards. A missing or
//! broken file yields an empty registry.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::RegistryError;

/// A named provider voice with its default prosody.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceRecord {
    #[serde(rename = "voice_id")]
    pub id: String,
    #[serde(rename = "voice_name", default)]
    pub display_name: String,
    pub stability: f64,
    pub similarity_boost: f64,
    #[serde(default)]
    pub description: String,
}

impl VoiceRecord {
    fn in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.stability) && (0.0..=1.0).contains(&self.similarity_boost)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    voices: HashMap<String, VoiceRecord>,
    #[serde(default)]
    default_volume: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceRegistry {
    voices: HashMap<String, VoiceRecord>,
    default_volume: Option<f64>,
}

impl VoiceRegistry {
    pub fn new(voices: HashMap<String, VoiceRecord>, default_volume: Option<f64>) -> Self {
        let voices = voices
            .into_iter()
            .filter(|(name, record)| {
                let ok = record.in_range();
                if !ok {
                    warn!(
                        "Dropping voice '{name}': stability {} / similarity_boost {} outside [0, 1]",
                        record.stability, record.similarity_boost
                    );
                }
                ok
            })
            .collect();
        Self {
            voices,
            default_volume,
        }
    }

    /// Find the standard registry file under `config_dir`.
    ///
    /// The markdown personality file wins over the JSON fallback.
    pub fn locate(config_dir: &Path) -> Option<PathBuf> {
        let candidates = [
            config_dir.join("skills/CORE/voice-personalities.md"),
            config_dir.join("VoiceServer/voice-personalities.json"),
        ];
        candidates.into_iter().find(|p| p.exists())
    }

    /// Load from an explicit path, or the standard location under `config_dir`.
    /// Never fails: problems are logged and an empty registry is returned.
    pub fn load_or_default(explicit: Option<&Path>, config_dir: &Path) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| Self::locate(config_dir));

        let Some(path) = path else {
            info!("No voice personalities found under {}, using defaults", config_dir.display());
            return Self::default();
        };

        match Self::load(&path) {
            Ok(registry) => {
                info!(
                    "Loaded {} voice personalities from {}",
                    registry.len(),
                    path.display()
                );
                registry
            }
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let contents = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        if is_markdown {
            let json = extract_json_block(&contents)
                .ok_or_else(|| RegistryError::MissingJsonBlock(path.display().to_string()))?;
            Self::from_json(json)
        } else {
            Self::from_json(&contents)
        }
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Ok(Self::new(file.voices, file.default_volume))
    }

    /// Look up by personality name first, then by raw provider voice id.
    pub fn lookup(&self, identifier: &str) -> Option<&VoiceRecord> {
        self.voices
            .get(identifier)
            .or_else(|| self.voices.values().find(|v| v.id == identifier))
    }

    /// Playback volume in `[0, 1]`: 1.0 when unset or not a number, clamped otherwise.
    pub fn volume(&self) -> f64 {
        match self.default_volume {
            Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
            _ => 1.0,
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

fn extract_json_block(markdown: &str) -> Option<&str> {
    let start = markdown.find("```json")?;
    let body = &markdown[start + "```json".len()..];
    let body = body.strip_prefix("\r\n").or_else(|| body.strip_prefix('\n'))?;
    let end = body.find("```")?;
    Some(body[..end].trim_end())
}
