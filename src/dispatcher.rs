//! Notification dispatch: validate → (emotion → voice → synthesize → play) → display.
//!
//! Only validation can fail a request. The voice path returns a `Result`
//! that `dispatch` logs and then discards; display errors are logged the
//! same way.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::emotion::{extract_emotion, Emotion};
use crate::error::{ValidationError, VoiceError};
use crate::notifier::DisplayNotifier;
use crate::playback::AudioPlayer;
use crate::resolver::VoiceResolver;
use crate::sanitizer;
use crate::synthesis::Synthesizer;

/// One inbound notification. Title and message are untrusted JSON values.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub title: Value,
    pub message: Value,
    pub voice_enabled: bool,
    pub voice_identifier: Option<String>,
}

/// Which field failed validation, and why.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid title: {0}")]
    Title(ValidationError),
    #[error("Invalid message: {0}")]
    Message(ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceOutcome {
    Spoken,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub voice: VoiceOutcome,
    pub displayed: bool,
    pub emotion: Option<Emotion>,
}

pub struct Dispatcher {
    resolver: VoiceResolver,
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn AudioPlayer>,
    notifier: Arc<dyn DisplayNotifier>,
}

impl Dispatcher {
    pub fn new(
        resolver: VoiceResolver,
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn AudioPlayer>,
        notifier: Arc<dyn DisplayNotifier>,
    ) -> Self {
        Self {
            resolver,
            synthesizer,
            player,
            notifier,
        }
    }

    pub fn resolver(&self) -> &VoiceResolver {
        &self.resolver
    }

    pub fn has_credentials(&self) -> bool {
        self.synthesizer.has_credentials()
    }

    pub async fn dispatch(&self, req: NotificationRequest) -> Result<DispatchReport, RequestError> {
        let title = sanitizer::validate(&req.title).map_err(RequestError::Title)?;
        let message = sanitizer::validate(&req.message).map_err(RequestError::Message)?;

        let extraction = extract_emotion(&message);
        let emotion = extraction.emotion;
        // Text on either side of the marker can join into something the first pass removed.
        let message = if emotion.is_some() {
            sanitizer::sanitize(&extraction.cleaned)
        } else {
            extraction.cleaned
        };

        let voice = if !req.voice_enabled {
            VoiceOutcome::Skipped
        } else if message.is_empty() {
            info!("Nothing left to speak after removing the emotion marker");
            VoiceOutcome::Skipped
        } else {
            let t0 = Instant::now();
            match self
                .speak(&message, req.voice_identifier.as_deref(), emotion)
                .await
            {
                Ok(()) => {
                    info!("Voice path finished in {}ms", t0.elapsed().as_millis());
                    VoiceOutcome::Spoken
                }
                Err(e) => {
                    // Best effort: the notification is still displayed.
                    warn!(stage = e.stage(), "Voice notification failed: {e}");
                    VoiceOutcome::Failed
                }
            }
        };

        let displayed = match self.notifier.notify(&title, &message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(stage = "display", "{e}");
                false
            }
        };

        Ok(DispatchReport {
            voice,
            displayed,
            emotion,
        })
    }

    /// The voice path. Errors are returned, never swallowed, here.
    async fn speak(
        &self,
        text: &str,
        identifier: Option<&str>,
        emotion: Option<Emotion>,
    ) -> Result<(), VoiceError> {
        let plan = self.resolver.plan(text.to_string(), identifier, emotion)?;

        if let Some(emotion) = plan.voice.emotion_applied {
            info!("Emotion: {} {emotion}", emotion.glyph());
        } else if let Some(personality) = &plan.voice.personality_applied {
            info!("Personality: {personality}");
        }
        info!(
            "Generating speech (voice: {} -> {}, stability: {}, boost: {})",
            identifier.or(self.resolver.default_voice()).unwrap_or("-"),
            plan.voice.provider_voice_id,
            plan.voice.settings.stability,
            plan.voice.settings.similarity_boost
        );

        let audio = self.synthesizer.synthesize(&plan).await?;
        self.player.play(&audio).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DisplayError;
    use crate::registry::VoiceRegistry;
    use crate::resolver::SynthesisPlan;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct FakeSynth {
        pub fail_with_status: Option<u16>,
        pub plans: Mutex<Vec<SynthesisPlan>>,
    }

    #[async_trait]
    impl Synthesizer for FakeSynth {
        async fn synthesize(&self, plan: &SynthesisPlan) -> Result<Vec<u8>, VoiceError> {
            self.plans.lock().unwrap().push(plan.clone());
            match self.fail_with_status {
                Some(status) => Err(VoiceError::ProviderRequest {
                    status,
                    body: "simulated".into(),
                }),
                None => Ok(b"audio".to_vec()),
            }
        }

        fn has_credentials(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    pub(crate) struct FakePlayer {
        pub fail: bool,
        pub played: Mutex<usize>,
    }

    #[async_trait]
    impl AudioPlayer for FakePlayer {
        async fn play(&self, _audio: &[u8]) -> Result<(), VoiceError> {
            *self.played.lock().unwrap() += 1;
            if self.fail {
                Err(VoiceError::Playback("exit code 1".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeNotifier {
        pub fail: bool,
        pub shown: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DisplayNotifier for FakeNotifier {
        async fn notify(&self, title: &str, message: &str) -> Result<(), DisplayError> {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            if self.fail {
                Err(DisplayError("osascript exited with code 1".into()))
            } else {
                Ok(())
            }
        }
    }

    pub(crate) struct Harness {
        pub synth: Arc<FakeSynth>,
        pub player: Arc<FakePlayer>,
        pub notifier: Arc<FakeNotifier>,
        pub dispatcher: Dispatcher,
    }

    pub(crate) fn harness(
        synth: FakeSynth,
        player: FakePlayer,
        notifier: FakeNotifier,
        default_voice: Option<&str>,
    ) -> Harness {
        let synth = Arc::new(synth);
        let player = Arc::new(player);
        let notifier = Arc::new(notifier);
        let resolver = VoiceResolver::new(
            Arc::new(VoiceRegistry::default()),
            default_voice.map(str::to_string),
        );
        let dispatcher = Dispatcher::new(
            resolver,
            synth.clone(),
            player.clone(),
            notifier.clone(),
        );
        Harness {
            synth,
            player,
            notifier,
            dispatcher,
        }
    }

    fn request(title: Value, message: Value) -> NotificationRequest {
        NotificationRequest {
            title,
            message,
            voice_enabled: true,
            voice_identifier: None,
        }
    }

    #[tokio::test]
    async fn emotion_marker_drives_settings_and_is_not_spoken() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("default-voice"),
        );
        let report = h
            .dispatcher
            .dispatch(request(json!("Build"), json!("[✨ success] Build finished")))
            .await
            .unwrap();

        assert_eq!(report.voice, VoiceOutcome::Spoken);
        assert_eq!(report.emotion, Some(Emotion::Success));
        let plans = h.synth.plans.lock().unwrap();
        assert_eq!(plans[0].text, "Build finished");
        assert_eq!(plans[0].voice.settings.stability, 0.6);
        assert_eq!(plans[0].voice.settings.similarity_boost, 0.8);
        assert_eq!(*h.player.played.lock().unwrap(), 1);
        assert_eq!(
            h.notifier.shown.lock().unwrap()[0],
            ("Build".to_string(), "Build finished".to_string())
        );
    }

    #[tokio::test]
    async fn provider_failure_does_not_block_display() {
        let h = harness(
            FakeSynth {
                fail_with_status: Some(500),
                ..FakeSynth::default()
            },
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("default-voice"),
        );
        let report = h
            .dispatcher
            .dispatch(request(json!("Deploy; rm -rf"), json!("Deploy done")))
            .await
            .unwrap();

        assert_eq!(report.voice, VoiceOutcome::Failed);
        assert!(report.displayed);
        assert_eq!(*h.player.played.lock().unwrap(), 0);
        assert_eq!(
            h.notifier.shown.lock().unwrap()[0],
            ("Deploy rm -rf".to_string(), "Deploy done".to_string())
        );
    }

    #[tokio::test]
    async fn playback_failure_does_not_block_display() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer {
                fail: true,
                ..FakePlayer::default()
            },
            FakeNotifier::default(),
            Some("default-voice"),
        );
        let report = h
            .dispatcher
            .dispatch(request(json!("t"), json!("m")))
            .await
            .unwrap();
        assert_eq!(report.voice, VoiceOutcome::Failed);
        assert_eq!(h.notifier.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_voice_short_circuits_before_synthesis() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            None,
        );
        let report = h
            .dispatcher
            .dispatch(request(json!("t"), json!("m")))
            .await
            .unwrap();
        assert_eq!(report.voice, VoiceOutcome::Failed);
        assert!(h.synth.plans.lock().unwrap().is_empty());
        assert!(report.displayed);
    }

    #[tokio::test]
    async fn display_failure_keeps_request_accepted() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier {
                fail: true,
                ..FakeNotifier::default()
            },
            Some("v"),
        );
        let report = h
            .dispatcher
            .dispatch(request(json!("t"), json!("m")))
            .await
            .unwrap();
        assert!(!report.displayed);
        assert_eq!(report.voice, VoiceOutcome::Spoken);
    }

    #[tokio::test]
    async fn validation_failure_does_no_work() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("v"),
        );
        let err = h
            .dispatcher
            .dispatch(request(json!("t"), json!("***")))
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Message(ValidationError::Empty));
        assert_eq!(
            err.to_string(),
            "Invalid message: Message contains no valid content after sanitization"
        );

        let err = h
            .dispatcher
            .dispatch(request(json!(7), json!("m")))
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Title(ValidationError::InvalidType));

        assert!(h.synth.plans.lock().unwrap().is_empty());
        assert!(h.notifier.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn voice_disabled_skips_synthesis() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("v"),
        );
        let mut req = request(json!("t"), json!("m"));
        req.voice_enabled = false;
        let report = h.dispatcher.dispatch(req).await.unwrap();
        assert_eq!(report.voice, VoiceOutcome::Skipped);
        assert!(h.synth.plans.lock().unwrap().is_empty());
        assert!(report.displayed);
    }

    #[tokio::test]
    async fn marker_only_message_is_never_synthesized() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("v"),
        );
        let report = h
            .dispatcher
            .dispatch(request(json!("t"), json!("[🎯 focused]")))
            .await
            .unwrap();
        assert_eq!(report.voice, VoiceOutcome::Skipped);
        assert!(h.synth.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn explicit_identifier_overrides_default() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("default-voice"),
        );
        let mut req = request(json!("t"), json!("m"));
        req.voice_identifier = Some("custom-voice".into());
        h.dispatcher.dispatch(req).await.unwrap();
        assert_eq!(
            h.synth.plans.lock().unwrap()[0].voice.provider_voice_id,
            "custom-voice"
        );
    }

    #[tokio::test]
    async fn marker_removal_cannot_splice_forbidden_text() {
        let h = harness(
            FakeSynth::default(),
            FakePlayer::default(),
            FakeNotifier::default(),
            Some("v"),
        );
        let report = h
            .dispatcher
            .dispatch(request(
                json!("t"),
                json!("..[✨ success]/etc/passwd #[🎯 focused] x"),
            ))
            .await
            .unwrap();

        assert_eq!(report.emotion, Some(Emotion::Success));
        let spoken = h.synth.plans.lock().unwrap()[0].text.clone();
        let shown = h.notifier.shown.lock().unwrap()[0].1.clone();
        for text in [&spoken, &shown] {
            assert!(!text.contains("../"), "{text:?}");
            assert!(!text.contains("# "), "{text:?}");
        }
        assert_eq!(spoken, shown);
    }
}
