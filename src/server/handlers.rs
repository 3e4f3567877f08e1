use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::response::{transcript_response, ErrorBody};
use super::AppState;
use crate::extractors::FetchRequest;
use crate::proxy::resolve_proxy;
use crate::utils::format_duration;

const SERVICE_NAME: &str = "transcript-service";

pub async fn home(State(state): State<Arc<AppState>>) -> Json<Value> {
    let proxy_enabled = resolve_proxy(state.fetcher.proxy_source()).is_some();

    Json(json!({
        "message": "YouTube Transcript API Service",
        "status": "live",
        "proxy_support": if proxy_enabled { "enabled" } else { "disabled" },
        "features": [
            "Proxy support",
            "User-agent rotation",
            "Retry logic",
            "Rate limiting protection"
        ],
        "endpoints": {
            "/transcript/<video_id>": "GET - Get transcript for a YouTube video",
            "/transcript/<video_id>/<language_code>": "GET - Get transcript in specific language",
            "/health": "GET - Health check",
            "/status": "GET - Service status"
        }
    }))
}

pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Response {
    tracing::debug!("GET /transcript/{}", video_id);
    fetch(&state, video_id, None).await
}

pub async fn get_transcript_with_language(
    State(state): State<Arc<AppState>>,
    Path((video_id, language_code)): Path<(String, String)>,
) -> Response {
    tracing::debug!("GET /transcript/{}/{}", video_id, language_code);
    fetch(&state, video_id, Some(language_code)).await
}

async fn fetch(state: &AppState, video_id: String, language_code: Option<String>) -> Response {
    let video_id = video_id.trim().to_string();
    let language_code = language_code.map(|l| l.trim().to_string());

    if video_id.is_empty() {
        let body = ErrorBody::new("Video ID must not be empty", &video_id, language_code.as_deref());
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let mut request = FetchRequest::new(video_id.clone());
    if let Some(lang) = language_code.as_deref().filter(|l| !l.is_empty()) {
        request = request.with_languages([lang]);
    }

    let outcome = state.fetcher.fetch_with_retry(&request).await;
    transcript_response(&video_id, language_code.as_deref(), outcome)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "proxy_enabled": resolve_proxy(state.fetcher.proxy_source()).is_some()
    }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let proxy = resolve_proxy(state.fetcher.proxy_source());
    let policy = state.fetcher.policy();
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);

    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "platform": state.fetcher.source().platform_name(),
        "features": {
            "proxy_support": proxy.is_some(),
            "retry_logic": true,
            "user_agent_rotation": true,
            "rate_limiting": true
        },
        "retry": {
            "max_attempts": policy.max_attempts,
            "retry_on": format!("{:?}", policy.retry_on),
            "overall_timeout_secs": policy.overall_timeout.map(|t| t.as_secs())
        },
        "environment": {
            "http_proxy": proxy.as_ref().is_some_and(|p| p.http_endpoint.is_some()),
            "https_proxy": proxy.as_ref().is_some_and(|p| p.https_endpoint.is_some())
        },
        "started_at": state.started_at,
        "uptime": format_duration(uptime as f64)
    }))
}
