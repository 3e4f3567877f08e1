use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::captions;
use super::{FetchError, FetchRequest, Transcript, TranscriptSource};
use crate::config::FetchConfig;
use crate::proxy::ProxyConfig;
use crate::utils::random_user_agent;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?key=";

/// YouTube transcript source backed by the InnerTube player API
pub struct YoutubeSource {
    request_timeout: Duration,
    default_languages: Vec<String>,
}

impl YoutubeSource {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            default_languages: config.default_languages.clone(),
        }
    }

    /// Build a client for one attempt with a fresh user agent and the given proxy
    fn build_client(&self, proxy: Option<&ProxyConfig>) -> Result<Client, FetchError> {
        let user_agent = random_user_agent();
        tracing::debug!("Using user agent: {}", user_agent);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
        headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));

        let mut builder = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(self.request_timeout);

        // Only the resolved config decides proxying, never reqwest's own env lookup
        let Some(proxy) = proxy else {
            return builder
                .no_proxy()
                .build()
                .map_err(|e| FetchError::Other(format!("Failed to build HTTP client: {}", e)));
        };

        if let Some(url) = proxy.http_endpoint.as_deref() {
            let p = Proxy::http(url)
                .map_err(|e| FetchError::Other(format!("Invalid HTTP proxy {}: {}", url, e)))?;
            builder = builder.proxy(p);
        }
        if let Some(url) = proxy.https_endpoint.as_deref() {
            let p = Proxy::https(url)
                .map_err(|e| FetchError::Other(format!("Invalid HTTPS proxy {}: {}", url, e)))?;
            builder = builder.proxy(p);
        }

        builder
            .build()
            .map_err(|e| FetchError::Other(format!("Failed to build HTTP client: {}", e)))
    }

    async fn fetch_watch_page(&self, client: &Client, video_id: &str) -> Result<String, FetchError> {
        tracing::debug!("Fetching watch page for: {}", video_id);

        let response = client.get(format!("{}{}", WATCH_URL, video_id)).send().await?;
        check_status(response.status(), video_id)?;

        let html = response.text().await?;
        if captions::is_bot_check(&html) {
            return Err(FetchError::Other(format!(
                "Request for video {} was blocked by a bot check",
                video_id
            )));
        }

        Ok(html)
    }

    async fn fetch_player(&self, client: &Client, video_id: &str, api_key: &str) -> Result<Value, FetchError> {
        tracing::debug!("Querying player API for: {}", video_id);

        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": "20.10.38"
                }
            },
            "videoId": video_id
        });

        let response = client
            .post(format!("{}{}", INNERTUBE_PLAYER_URL, api_key))
            .json(&body)
            .send()
            .await?;
        check_status(response.status(), video_id)?;

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Other(format!("Failed to parse player response: {}", e)))
    }
}

#[async_trait]
impl TranscriptSource for YoutubeSource {
    async fn fetch(
        &self,
        request: &FetchRequest,
        proxy: Option<ProxyConfig>,
    ) -> Result<Transcript, FetchError> {
        let video_id = request.video_id.as_str();
        let languages = request.languages().unwrap_or(self.default_languages.as_slice());

        let client = self.build_client(proxy.as_ref())?;

        let html = self.fetch_watch_page(&client, video_id).await?;
        let api_key = captions::extract_api_key(&html).ok_or_else(|| {
            FetchError::Other(format!("Could not find the player API key for video {}", video_id))
        })?;

        let player = self.fetch_player(&client, video_id, &api_key).await?;
        captions::check_playability(video_id, &player)?;

        let tracks = captions::caption_tracks(video_id, &player)?;
        let track = captions::select_track(video_id, &tracks, languages)?;
        tracing::debug!(
            "Selected {} track '{}' for {}",
            if track.is_generated { "generated" } else { "manual" },
            track.name,
            video_id
        );

        if track.base_url.contains("&exp=xpe") {
            return Err(FetchError::Other(format!(
                "Caption track for video {} requires a proof-of-origin token",
                video_id
            )));
        }

        let response = client.get(&track.base_url).send().await?;
        check_status(response.status(), video_id)?;
        let xml = response.text().await?;

        captions::transcript_from_timedtext(video_id, &xml)
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }
}

fn check_status(status: StatusCode, video_id: &str) -> Result<(), FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::Other(format!(
            "Request for video {} was rate limited (HTTP 429)",
            video_id
        )));
    }
    if !status.is_success() {
        return Err(FetchError::Other(format!("HTTP {} while fetching video {}", status, video_id)));
    }
    Ok(())
}
