//! TTS provider client (ElevenLabs text-to-speech API).
//!
//! One request per utterance, no retries. Failures are typed so the
//! dispatcher can log which part of the call went wrong.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::VoiceError;
use crate::resolver::{SynthesisPlan, VoiceSettings};

/// Longest provider error body kept in a `ProviderRequest` error.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Turn a resolved plan into encoded audio bytes.
    async fn synthesize(&self, plan: &SynthesisPlan) -> Result<Vec<u8>, VoiceError>;

    /// Whether a provider credential is configured.
    fn has_credentials(&self) -> bool;
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

pub struct ElevenLabsClient {
    api_key: Option<String>,
    base_url: Url,
    model_id: String,
    client: Client,
}

impl ElevenLabsClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            VoiceError::Config(format!("Invalid provider base URL {:?}: {e}", config.base_url))
        })?;

        Ok(Self {
            api_key: config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            base_url,
            model_id: config.model_id.clone(),
            client,
        })
    }

    /// `{base}/v1/text-to-speech/{voice_id}` with the id as one encoded path segment.
    fn endpoint(&self, voice_id: &str) -> Result<Url, VoiceError> {
        if matches!(voice_id.trim(), "" | "." | "..") {
            return Err(VoiceError::Config(format!("Invalid voice id {voice_id:?}")));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| VoiceError::Config(format!("Provider base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", voice_id]);
        Ok(url)
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsClient {
    async fn synthesize(&self, plan: &SynthesisPlan) -> Result<Vec<u8>, VoiceError> {
        let api_key = self.api_key.as_deref().ok_or(VoiceError::ProviderAuth)?;
        let voice_id = &plan.voice.provider_voice_id;
        let url = self.endpoint(voice_id)?;
        let body = SynthesisRequest {
            text: &plan.text,
            model_id: &self.model_id,
            voice_settings: plan.voice.settings,
        };

        debug!("Requesting speech from {} ({} chars)", url.path(), plan.text.len());
        let t0 = Instant::now();

        let resp = self
            .client
            .post(url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VoiceError::ProviderUnavailable(format!("request timed out: {e}"))
                } else {
                    VoiceError::ProviderUnavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(VoiceError::ProviderRequest {
                status: status.as_u16(),
                body,
            });
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| VoiceError::ProviderUnavailable(format!("failed to read audio: {e}")))?;

        info!(
            "Synthesized {} bytes (voice: {voice_id}) in {}ms",
            audio.len(),
            t0.elapsed().as_millis()
        );
        Ok(audio.to_vec())
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}
