use std::{env, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{time_control::TimeControl, GuessmeError, Result};

pub const API_URL_ENV: &str = "GUESSME_API_URL";
pub const WS_URL_ENV: &str = "GUESSME_WS_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
        }
    }
}

impl ApiConfig {
    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    /// File holding the persisted client token. Falls back to the platform
    /// data directory when unset.
    pub store_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub bind_addr: String,
    pub port: u16,
    pub emit_interval_ms: u64,
    pub max_predictions: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8080,
            emit_interval_ms: 500,
            max_predictions: 5,
        }
    }
}

impl MockConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GuessmeConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub timer: TimeControl,
    #[serde(default)]
    pub ops: OpsConfig,
    #[serde(default)]
    pub mock: MockConfig,
}

impl GuessmeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            GuessmeError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            GuessmeError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    /// Apply `GUESSME_API_URL` / `GUESSME_WS_URL` when present.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(API_URL_ENV) {
            self.override_api_url(url);
        }
        if let Ok(url) = env::var(WS_URL_ENV) {
            self.override_stream_url(url);
        }
    }

    pub fn override_api_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !url.trim().is_empty() {
            self.api.base_url = url.trim().to_string();
        }
    }

    /// Accepts either a full `ws://` URL or a bare `host:port`.
    pub fn override_stream_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        let url = url.trim();
        if url.is_empty() {
            return;
        }
        self.stream.url = if url.starts_with("ws://") || url.starts_with("wss://") {
            url.to_string()
        } else {
            format!("ws://{url}")
        };
    }

    pub fn validate(&self) -> Result<()> {
        let api = self.api.base_url.trim();
        if !(api.starts_with("http://") || api.starts_with("https://")) {
            return Err(GuessmeError::Configuration(
                "api.base_url must be an http(s) URL".into(),
            ));
        }
        let stream = self.stream.url.trim();
        if !(stream.starts_with("ws://") || stream.starts_with("wss://")) {
            return Err(GuessmeError::Configuration(
                "stream.url must be a ws(s) URL".into(),
            ));
        }
        if self.timer.round_seconds == 0 {
            return Err(GuessmeError::Configuration(
                "timer.round_seconds must be greater than zero".into(),
            ));
        }
        if self.timer.warning_threshold > self.timer.round_seconds {
            return Err(GuessmeError::Configuration(
                "timer.warning_threshold must not exceed timer.round_seconds".into(),
            ));
        }
        if self.mock.emit_interval_ms == 0 {
            return Err(GuessmeError::Configuration(
                "mock.emit_interval_ms must be greater than zero".into(),
            ));
        }
        if self.mock.max_predictions == 0 {
            return Err(GuessmeError::Configuration(
                "mock.max_predictions must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_guessme_config_from_file() {
        let temp_path = std::env::temp_dir().join("guessme-config-test.toml");
        let mut config = GuessmeConfig::default();
        config.api.base_url = "http://predictor:9000".into();
        config.timer = TimeControl {
            round_seconds: 45,
            warning_threshold: 5,
        };
        config.mock.max_predictions = 3;

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = GuessmeConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.api.base_url, "http://predictor:9000");
        assert_eq!(loaded.timer, config.timer);
        assert_eq!(loaded.mock.max_predictions, 3);
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: GuessmeConfig = toml::from_str("[timer]\nround_seconds = 20\n").expect("parse");
        assert_eq!(parsed.api.base_url, "http://localhost:8000");
        assert_eq!(parsed.stream.url, "ws://localhost:8080");
        assert_eq!(parsed.timer.round_seconds, 20);
        assert_eq!(parsed.timer.warning_threshold, 10);
        assert_eq!(parsed.api.predict_url(), "http://localhost:8000/predict");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let parsed: GuessmeConfig =
            toml::from_str("[mock]\nport = 9000\n\n[ops]\nlog_file = \"state/guessme.log\"\n")
                .expect("parse");
        assert_eq!(parsed.mock.port, 9000);
        assert_eq!(parsed.mock.bind_addr, "127.0.0.1");
        assert_eq!(parsed.mock.emit_interval_ms, 500);
        assert_eq!(parsed.mock.max_predictions, 5);
        assert_eq!(parsed.ops.log_level, "info");
        assert_eq!(parsed.ops.log_file.as_deref(), Some("state/guessme.log"));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn stream_override_accepts_bare_host() {
        let mut config = GuessmeConfig::default();
        config.override_stream_url("localhost:9090");
        assert_eq!(config.stream.url, "ws://localhost:9090");
        config.override_stream_url("wss://example.test/ws");
        assert_eq!(config.stream.url, "wss://example.test/ws");
        config.override_api_url("  ");
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = GuessmeConfig::default();
        assert!(config.validate().is_ok());

        config.api.base_url = "localhost:8000".into();
        assert!(config.validate().is_err());
        config.api.base_url = "http://localhost:8000/".into();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.predict_url(), "http://localhost:8000/predict");

        config.stream.url = "http://localhost:8080".into();
        assert!(config.validate().is_err());
        config.stream.url = "ws://localhost:8080".into();

        config.timer.round_seconds = 0;
        assert!(config.validate().is_err());
        config.timer.round_seconds = 5;
        assert!(config.validate().is_err());
        config.timer.round_seconds = 30;

        config.mock.emit_interval_ms = 0;
        assert!(config.validate().is_err());
        config.mock.emit_interval_ms = 500;
        config.mock.max_predictions = 0;
        assert!(config.validate().is_err());
        config.mock.max_predictions = 5;
        assert!(config.validate().is_ok());
    }
}
