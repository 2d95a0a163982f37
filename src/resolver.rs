//! Voice resolution: identifier + emotion → provider voice id + prosody.
//!
//! Priority, highest first: emotion preset, registry personality, fixed
//! defaults. The voice id always comes from the registry when the
//! identifier is registered, otherwise the identifier passes through.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::emotion::Emotion;
use crate::error::VoiceError;
use crate::registry::VoiceRegistry;

/// Prosody pair sent to the provider. Both values lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVoice {
    pub provider_voice_id: String,
    pub settings: VoiceSettings,
    pub emotion_applied: Option<Emotion>,
    pub personality_applied: Option<String>,
}

/// Everything the synthesis client needs for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPlan {
    pub text: String,
    pub voice: ResolvedVoice,
}

pub struct VoiceResolver {
    registry: Arc<VoiceRegistry>,
    default_voice: Option<String>,
}

impl VoiceResolver {
    pub fn new(registry: Arc<VoiceRegistry>, default_voice: Option<String>) -> Self {
        let default_voice = default_voice.filter(|v| !v.trim().is_empty());
        Self {
            registry,
            default_voice,
        }
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn default_voice(&self) -> Option<&str> {
        self.default_voice.as_deref()
    }

    /// Resolve the final voice. Fails before any network call when no voice
    /// id can be determined.
    pub fn resolve(
        &self,
        identifier: Option<&str>,
        emotion: Option<Emotion>,
    ) -> Result<ResolvedVoice, VoiceError> {
        let identifier = identifier
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or(self.default_voice.as_deref())
            .unwrap_or("");

        let record = self.registry.lookup(identifier);
        let provider_voice_id = record.map_or(identifier, |r| r.id.as_str()).to_string();

        if provider_voice_id.is_empty() {
            return Err(VoiceError::Config(
                "no voice id given and no default voice configured (set ELEVENLABS_VOICE_ID)"
                    .into(),
            ));
        }

        let resolved = match (emotion, record) {
            (Some(emotion), _) => ResolvedVoice {
                provider_voice_id,
                settings: emotion.preset().settings(),
                emotion_applied: Some(emotion),
                personality_applied: None,
            },
            (None, Some(record)) => ResolvedVoice {
                provider_voice_id,
                settings: VoiceSettings {
                    stability: record.stability,
                    similarity_boost: record.similarity_boost,
                },
                emotion_applied: None,
                personality_applied: Some(if record.display_name.is_empty() {
                    record.id.clone()
                } else {
                    record.display_name.clone()
                }),
            },
            (None, None) => ResolvedVoice {
                provider_voice_id,
                settings: VoiceSettings::default(),
                emotion_applied: None,
                personality_applied: None,
            },
        };

        debug!(
            identifier,
            voice_id = %resolved.provider_voice_id,
            stability = resolved.settings.stability,
            similarity_boost = resolved.settings.similarity_boost,
            "Resolved voice"
        );
        Ok(resolved)
    }

    pub fn plan(
        &self,
        text: String,
        identifier: Option<&str>,
        emotion: Option<Emotion>,
    ) -> Result<SynthesisPlan, VoiceError> {
        let voice = self.resolve(identifier, emotion)?;
        Ok(SynthesisPlan { text, voice })
    }
}
