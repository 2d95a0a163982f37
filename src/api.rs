//! HTTP API for voice notifications.
//!
//! `POST /notify` and `POST /pai` are rate limited per client; `GET /health`
//! and CORS preflight are not. Runs on port 8888 (configurable) using axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::dispatcher::{DispatchReport, Dispatcher, NotificationRequest, VoiceOutcome};
use crate::rate_limit::{client_key, RateLimiter};

const LOCAL_ORIGIN: &str = "http://localhost";

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub rate_limiter: Arc<RateLimiter>,
    pub port: u16,
    pub config_dir: String,
}

// --- Errors ---

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "status": "error", "message": self.to_string() }));
        let mut response = (status, body).into_response();
        if matches!(self, ApiError::RateLimited) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("60"));
        }
        response
    }
}

// --- Request/Response types ---

/// Raw body. Fields stay untyped so wrong types become validation errors.
#[derive(Deserialize, Default)]
struct NotifyBody {
    #[serde(default)]
    title: Value,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    voice_enabled: Value,
    #[serde(default)]
    voice_id: Value,
    #[serde(default)]
    voice_name: Value,
}

#[derive(Serialize)]
struct NotifyResponse {
    status: &'static str,
    message: &'static str,
    voice: VoiceOutcome,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    port: u16,
    voice_system: &'static str,
    default_voice_id: String,
    api_key_configured: bool,
    voices_loaded: usize,
    config_dir: String,
}

/// Null, false, 0 and "" count as absent.
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn or_default(v: Value, default: &str) -> Value {
    if is_blank(&v) {
        Value::String(default.to_string())
    } else {
        v
    }
}

fn parse_body(body: &Bytes) -> Result<NotifyBody, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

fn preview(v: &Value) -> String {
    let text = v.as_str().map_or_else(|| v.to_string(), str::to_string);
    let short: String = text.chars().take(80).collect();
    short.replace('\n', " ")
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    let limited = Router::new()
        .route("/notify", post(handle_notify))
        .route("/pai", post(handle_pai))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static(LOCAL_ORIGIN))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handle_health))
        .merge(limited)
        .fallback(handle_root)
        .method_not_allowed_fallback(handle_root)
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: ApiState, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Voice notification server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
}

// --- Middleware ---

async fn rate_limit(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let key = client_key(forwarded);

    if !state.rate_limiter.allow(&key) {
        warn!("Rate limit exceeded for client {key}");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

// --- Handlers ---

async fn handle_notify(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>, ApiError> {
    let body = parse_body(&body)?;

    let voice_id = if is_blank(&body.voice_id) {
        body.voice_name
    } else {
        body.voice_id
    };
    let voice_identifier = match voice_id {
        Value::String(s) if !s.is_empty() => Some(s),
        v if is_blank(&v) => None,
        _ => return Err(ApiError::BadRequest("Invalid voice_id".into())),
    };

    let req = NotificationRequest {
        title: or_default(body.title, "Notification"),
        message: or_default(body.message, "Task completed"),
        voice_enabled: body.voice_enabled != Value::Bool(false),
        voice_identifier,
    };

    info!(
        "Notification: \"{}\" - \"{}\" (voice: {}, voice_id: {})",
        preview(&req.title),
        preview(&req.message),
        req.voice_enabled,
        req.voice_identifier
            .as_deref()
            .or(state.dispatcher.resolver().default_voice())
            .unwrap_or("-"),
    );

    let report = run_dispatch(&state, req).await?;
    Ok(Json(NotifyResponse {
        status: "success",
        message: "Notification sent",
        voice: report.voice,
    }))
}

async fn handle_pai(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>, ApiError> {
    let body = parse_body(&body)?;

    let req = NotificationRequest {
        title: or_default(body.title, "Assistant"),
        message: or_default(body.message, "Task completed"),
        voice_enabled: true,
        voice_identifier: None,
    };
    info!(
        "Assistant notification: \"{}\" - \"{}\"",
        preview(&req.title),
        preview(&req.message)
    );

    let report = run_dispatch(&state, req).await?;
    Ok(Json(NotifyResponse {
        status: "success",
        message: "Assistant notification sent",
        voice: report.voice,
    }))
}

/// Run the dispatcher on its own task so a panic maps to a 500.
async fn run_dispatch(state: &ApiState, req: NotificationRequest) -> Result<DispatchReport, ApiError> {
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move { dispatcher.dispatch(req).await })
        .await
        .map_err(|e| {
            error!("Notification task failed: {e}");
            ApiError::Internal("Internal server error".into())
        })?
        .map_err(|e| {
            warn!("Rejected notification: {e}");
            ApiError::BadRequest(e.to_string())
        })
}

async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let resolver = state.dispatcher.resolver();
    Json(HealthResponse {
        status: "healthy",
        port: state.port,
        voice_system: "ElevenLabs",
        default_voice_id: resolver
            .default_voice()
            .unwrap_or("(not configured)")
            .to_string(),
        api_key_configured: state.dispatcher.has_credentials(),
        voices_loaded: resolver.registry().len(),
        config_dir: state.config_dir.clone(),
    })
}

async fn handle_root() -> &'static str {
    "Voice notification server - POST to /notify or /pai"
}
