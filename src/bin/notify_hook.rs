//! notify-hook: posts a notification to a running voice-notify server.
//!
//! Meant to be called from editor/agent hooks. Arguments come from the
//! command line, or a JSON body on stdin with `--stdin`. Failures go to
//! stderr with a non-zero exit; nothing is retried.

use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "http://127.0.0.1:8888";

#[derive(Parser, Debug)]
#[command(name = "notify-hook", about = "Send a voice notification")]
struct Args {
    /// Notification title
    #[arg(short, long)]
    title: Option<String>,

    /// Notification message (may start with an emotion marker like "[✨ success]")
    #[arg(short, long)]
    message: Option<String>,

    /// Voice name or provider voice id
    #[arg(long)]
    voice: Option<String>,

    /// Display only, do not speak
    #[arg(long)]
    no_voice: bool,

    /// Server base URL
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Read `{title, message, voice_id}` JSON from stdin
    #[arg(long)]
    stdin: bool,
}

/// Body read from stdin; fields left out fall back to the flags.
#[derive(Deserialize, Default)]
struct StdinBody {
    title: Option<String>,
    message: Option<String>,
    voice_id: Option<String>,
}

#[derive(Serialize)]
struct NotifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    voice_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<String>,
}

#[derive(Deserialize)]
struct NotifyResponse {
    status: Option<String>,
    message: Option<String>,
    voice: Option<String>,
}

fn build_request(args: &Args, body: StdinBody) -> NotifyRequest {
    NotifyRequest {
        title: body.title.or_else(|| args.title.clone()),
        message: body.message.or_else(|| args.message.clone()),
        voice_enabled: !args.no_voice,
        voice_id: body.voice_id.or_else(|| args.voice.clone()),
    }
}

fn read_stdin_body() -> Result<StdinBody, String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    if input.trim().is_empty() {
        return Ok(StdinBody::default());
    }
    serde_json::from_str(&input).map_err(|e| format!("invalid JSON on stdin: {e}"))
}

async fn send(url: &str, request: &NotifyRequest) -> Result<NotifyResponse, String> {
    let client = Client::builder()
        .connect_timeout(Duration::from_millis(500))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| format!("failed to create HTTP client: {e}"))?;

    let endpoint = format!("{}/notify", url.trim_end_matches('/'));
    let resp = client
        .post(&endpoint)
        .json(request)
        .send()
        .await
        .map_err(|e| format!("request to {endpoint} failed: {e}"))?;

    let status = resp.status();
    let body: NotifyResponse = resp
        .json()
        .await
        .map_err(|e| format!("unreadable response ({status}): {e}"))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(format!(
            "server returned {status}: {}",
            body.message.as_deref().unwrap_or("no message")
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let body = if args.stdin {
        match read_stdin_body() {
            Ok(b) => b,
            Err(e) => {
                eprintln!("notify-hook: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        StdinBody::default()
    };

    let request = build_request(&args, body);
    match send(&args.url, &request).await {
        Ok(resp) => {
            if resp.voice.as_deref() == Some("failed") {
                eprintln!("notify-hook: notification shown, voice output failed");
            }
            if resp.status.as_deref() != Some("success") {
                eprintln!("notify-hook: unexpected status {:?}", resp.status);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("notify-hook: {e}");
            ExitCode::FAILURE
        }
    }
}
