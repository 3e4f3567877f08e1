use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::proxy::{EnvProxySource, ProxySource, StaticProxySource, HTTPS_PROXY_VAR, HTTP_PROXY_VAR};
use crate::ServiceError;

pub const PORT_VAR: &str = "PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Proxy endpoints used for remote fetches
    pub proxy: ProxySettings,

    /// Retry policy settings
    pub retry: RetryConfig,

    /// Transcript fetch settings
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy for plain HTTP requests
    pub http: Option<String>,

    /// Proxy for HTTPS requests
    pub https: Option<String>,

    /// Read `HTTP_PROXY` / `HTTPS_PROXY` on every attempt instead of the values above
    #[serde(default)]
    pub live_env: bool,
}

impl ProxySettings {
    /// Proxy source the fetcher resolves from on every attempt
    pub fn source(&self) -> Arc<dyn ProxySource> {
        if self.live_env {
            Arc::new(EnvProxySource)
        } else {
            Arc::new(StaticProxySource::from(self))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,

    /// Lower bound of the jittered delay before a retry
    pub min_delay_ms: u64,

    /// Upper bound of the jittered delay before a retry
    pub max_delay_ms: u64,

    /// Deadline for a whole fetch including retries
    pub overall_timeout_secs: Option<u64>,

    /// Stop retrying when transcripts are disabled or the video is unavailable
    pub short_circuit_permanent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for each HTTP request made to the platform
    pub request_timeout_secs: u64,

    /// Languages tried when a request names none
    pub default_languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            proxy: ProxySettings::default(),
            retry: RetryConfig {
                max_attempts: 3,
                min_delay_ms: 1000,
                max_delay_ms: 3000,
                overall_timeout_secs: Some(120),
                short_circuit_permanent: false,
            },
            fetch: FetchConfig {
                request_timeout_secs: 10,
                default_languages: vec!["en".to_string()],
            },
        }
    }
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from file or fall back to defaults, then apply
    /// environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-service").join("config.yaml"))
    }

    /// Overlay `HTTP_PROXY`, `HTTPS_PROXY` and `PORT` from the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(http) = lookup(HTTP_PROXY_VAR) {
            self.proxy.http = Some(http);
        }
        if let Some(https) = lookup(HTTPS_PROXY_VAR) {
            self.proxy.https = Some(https);
        }
        if let Some(port) = lookup(PORT_VAR).filter(|p| !p.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", PORT_VAR, port))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(ServiceError::Config("retry.max_attempts must be at least 1".to_string()).into());
        }

        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(ServiceError::Config(format!(
                "retry.min_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.min_delay_ms, self.retry.max_delay_ms
            ))
            .into());
        }

        if self.fetch.default_languages.is_empty() {
            return Err(ServiceError::Config("fetch.default_languages must not be empty".to_string()).into());
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  HTTP Proxy: {}", self.proxy.http.as_deref().unwrap_or("(none)"));
        println!("  HTTPS Proxy: {}", self.proxy.https.as_deref().unwrap_or("(none)"));
        if self.proxy.live_env {
            println!("  Proxy Source: live environment");
        }
        println!("  Max Attempts: {}", self.retry.max_attempts);
        println!("  Retry Delay: {}-{} ms", self.retry.min_delay_ms, self.retry.max_delay_ms);
        if let Some(timeout) = self.retry.overall_timeout_secs {
            println!("  Overall Timeout: {}s", timeout);
        }
        println!("  Short-circuit Permanent Errors: {}", self.retry.short_circuit_permanent);
        println!("  Default Languages: {}", self.fetch.default_languages.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{resolve_proxy, ENV_LOCK};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.min_delay(), Duration::from_secs(1));
        assert_eq!(config.retry.max_delay(), Duration::from_secs(3));
        assert!(!config.retry.short_circuit_permanent);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("HTTP_PROXY", "http://proxy:8080"),
                ("PORT", "10000"),
            ]))
            .unwrap();

        assert_eq!(config.proxy.http.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.proxy.https, None);
        assert_eq!(config.server.port, 10000);
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = Config::default();
        assert!(config.apply_overrides(lookup(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_retry_settings() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.min_delay_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.default_languages.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_preserves_settings() {
        let mut config = Config::default();
        config.proxy.https = Some("http://proxy:8443".to_string());
        config.retry.short_circuit_permanent = true;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.proxy.https.as_deref(), Some("http://proxy:8443"));
        assert!(parsed.retry.short_circuit_permanent);
        assert_eq!(parsed.server.port, 5000);
    }

    #[test]
    fn test_empty_proxy_settings_resolve_to_none() {
        let settings = ProxySettings {
            http: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(resolve_proxy(settings.source().as_ref()), None);

        let settings = ProxySettings {
            https: Some("http://proxy:8443".to_string()),
            ..Default::default()
        };
        assert!(resolve_proxy(settings.source().as_ref()).is_some());
    }

    #[test]
    fn test_live_env_proxy_source_follows_environment() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let settings = ProxySettings {
            http: Some("http://static:8080".to_string()),
            https: None,
            live_env: true,
        };
        let source = settings.source();

        std::env::set_var(HTTP_PROXY_VAR, "http://live:8080");
        std::env::remove_var(HTTPS_PROXY_VAR);
        let proxy = resolve_proxy(source.as_ref()).expect("proxy should resolve");
        assert_eq!(proxy.http_endpoint.as_deref(), Some("http://live:8080"));

        std::env::remove_var(HTTP_PROXY_VAR);
        assert_eq!(resolve_proxy(source.as_ref()), None);
    }

    #[test]
    fn test_proxy_section_without_live_env_parses() {
        let settings: ProxySettings = serde_yaml::from_str("http: http://proxy:8080\nhttps: null\n").unwrap();
        assert_eq!(settings.http.as_deref(), Some("http://proxy:8080"));
        assert!(!settings.live_env);
    }
}
