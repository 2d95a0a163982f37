//! voice-notify-rs: local HTTP service that speaks and displays notifications.

mod api;
mod config;
mod dispatcher;
mod emotion;
mod error;
mod notifier;
mod playback;
mod rate_limit;
mod registry;
mod resolver;
mod sanitizer;
mod synthesis;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "voice-notify-rs", about = "Voice notification server")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config and environment)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug,hyper=info,reqwest=info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("voice-notify-rs starting");

    let mut config = config::Config::load(args.config.as_deref());
    let dotenv = config::load_dotenv();
    config.apply_env(config::env_lookup(&dotenv));
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let config_dir = config.config_dir();
    let registry = Arc::new(registry::VoiceRegistry::load_or_default(
        config.registry_path.as_deref(),
        &config_dir,
    ));

    if registry.is_empty() {
        info!("No voice personalities loaded, using emotion presets and defaults only");
    }

    if !config.provider.has_api_key() {
        warn!("ELEVENLABS_API_KEY not configured, voice output will fail");
    }
    let default_voice = config.default_voice().map(str::to_string);
    if default_voice.is_none() {
        warn!("No default voice configured, requests without voice_id will not be spoken");
    }

    let resolver = resolver::VoiceResolver::new(registry.clone(), default_voice);
    let synthesizer = Arc::new(synthesis::ElevenLabsClient::new(&config.provider)?);
    let player = Arc::new(playback::CommandPlayer::new(&config.playback, registry.volume()));
    let notifier: Arc<dyn notifier::DisplayNotifier> =
        Arc::from(notifier::from_config(&config.display));

    let dispatcher = dispatcher::Dispatcher::new(resolver, synthesizer, player, notifier);
    let rate_limiter = rate_limit::RateLimiter::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_secs),
    );

    let state = api::ApiState {
        dispatcher: Arc::new(dispatcher),
        rate_limiter: Arc::new(rate_limiter),
        port: config.server.port,
        config_dir: config_dir.display().to_string(),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(
        "Voice: ElevenLabs (default voice: {}, {} personalities, display: {:?})",
        config.default_voice().unwrap_or("(not configured)"),
        registry.len(),
        config.display.backend
    );

    api::serve(state, addr).await?;
    Ok(())
}
