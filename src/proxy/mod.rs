use serde::{Deserialize, Serialize};

use crate::config::ProxySettings;

pub const HTTP_PROXY_VAR: &str = "HTTP_PROXY";
pub const HTTPS_PROXY_VAR: &str = "HTTPS_PROXY";

/// Proxy endpoints handed to the fetch collaborator for a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub http_endpoint: Option<String>,
    pub https_endpoint: Option<String>,
}

/// Where proxy endpoint values come from
pub trait ProxySource: Send + Sync {
    fn http_proxy(&self) -> Option<String>;

    fn https_proxy(&self) -> Option<String>;
}

/// Endpoints captured once from configuration at startup
#[derive(Debug, Clone, Default)]
pub struct StaticProxySource {
    http: Option<String>,
    https: Option<String>,
}

impl StaticProxySource {
    pub fn new(http: Option<String>, https: Option<String>) -> Self {
        Self { http, https }
    }
}

impl From<&ProxySettings> for StaticProxySource {
    fn from(settings: &ProxySettings) -> Self {
        Self::new(settings.http.clone(), settings.https.clone())
    }
}

impl ProxySource for StaticProxySource {
    fn http_proxy(&self) -> Option<String> {
        self.http.clone()
    }

    fn https_proxy(&self) -> Option<String> {
        self.https.clone()
    }
}

/// Reads `HTTP_PROXY` / `HTTPS_PROXY` on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProxySource;

impl ProxySource for EnvProxySource {
    fn http_proxy(&self) -> Option<String> {
        std::env::var(HTTP_PROXY_VAR).ok()
    }

    fn https_proxy(&self) -> Option<String> {
        std::env::var(HTTPS_PROXY_VAR).ok()
    }
}

/// Resolve the proxy configuration for one fetch attempt.
///
/// Returns `None` when both endpoints are absent or empty. Values are not
/// validated here; a malformed URL fails later when the HTTP client is built.
pub fn resolve_proxy(source: &dyn ProxySource) -> Option<ProxyConfig> {
    let http_endpoint = non_empty(source.http_proxy());
    let https_endpoint = non_empty(source.https_proxy());

    if http_endpoint.is_none() && https_endpoint.is_none() {
        return None;
    }

    Some(ProxyConfig {
        http_endpoint,
        https_endpoint,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Serialises tests that mutate the proxy environment variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
