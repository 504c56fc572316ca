use crate::error::{CouncilError, Result};
use serde::Deserialize;
use std::env;
use std::fs;

const DEFAULT_BASE_URL: &str = "http://localhost:8081/api";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub trailing_frame: TrailingFramePolicy,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// What to do with text left in the assembly buffer when the stream ends
/// without a closing blank line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingFramePolicy {
    /// Decode the remainder as one last frame.
    #[default]
    Flush,
    /// Discard the remainder.
    Drop,
}

impl std::str::FromStr for TrailingFramePolicy {
    type Err = CouncilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flush" => Ok(Self::Flush),
            "drop" => Ok(Self::Drop),
            other => Err(CouncilError::ConfigError(format!(
                "Unknown trailing frame policy: {}",
                other
            ))),
        }
    }
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            trailing_frame: TrailingFramePolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(base_url),
            stream: StreamConfig::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url =
            env::var("COUNCIL_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let token = env::var("COUNCIL_API_TOKEN").ok().filter(|t| !t.is_empty());

        let connect_timeout_secs = match env::var("COUNCIL_CONNECT_TIMEOUT_SECS") {
            Ok(v) => v.parse::<u64>().map_err(|e| {
                CouncilError::ConfigError(format!("Invalid connect timeout value: {}", e))
            })?,
            Err(_) => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let trailing_frame = match env::var("COUNCIL_TRAILING_FRAME") {
            Ok(v) => v.parse()?,
            Err(_) => TrailingFramePolicy::default(),
        };

        let max_frame_bytes = match env::var("COUNCIL_MAX_FRAME_BYTES") {
            Ok(v) => v.parse::<usize>().map_err(|e| {
                CouncilError::ConfigError(format!("Invalid max frame bytes value: {}", e))
            })?,
            Err(_) => DEFAULT_MAX_FRAME_BYTES,
        };

        Ok(ClientConfig {
            api: ApiConfig {
                base_url,
                token,
                connect_timeout_secs,
            },
            stream: StreamConfig {
                trailing_frame,
                max_frame_bytes,
            },
        })
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CouncilError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Allow environment variables to override file config
        if let Ok(token) = env::var("COUNCIL_API_TOKEN")
            && !token.is_empty()
        {
            config.api.token = Some(token);
        }

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| CouncilError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(CouncilError::ConfigError("Base URL is empty".to_string()));
        }

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CouncilError::ConfigError(format!(
                "Base URL must use http or https: {}",
                base_url
            )));
        }

        if self.api.connect_timeout_secs == 0 {
            return Err(CouncilError::ConfigError(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.stream.max_frame_bytes == 0 {
            return Err(CouncilError::ConfigError(
                "Max frame bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let valid_config = ClientConfig::new("https://council.example.com/api");
        assert!(valid_config.validate().is_ok());

        let mut invalid_config = ClientConfig::new("https://council.example.com/api");
        invalid_config.api.connect_timeout_secs = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = ClientConfig::new("https://council.example.com/api");
        invalid_config.stream.max_frame_bytes = 0;
        assert!(invalid_config.validate().is_err());

        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("ftp://council").validate().is_err());
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            [api]
            base_url = "http://127.0.0.1:8081/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://127.0.0.1:8081/api");
        assert!(config.api.token.is_none());
        assert_eq!(config.api.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.stream.trailing_frame, TrailingFramePolicy::Flush);
        assert_eq!(config.stream.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn test_parse_toml_stream_section() {
        let config = ClientConfig::from_toml(
            r#"
            [api]
            base_url = "https://council.example.com/api"
            token = "secret"
            connect_timeout_secs = 3

            [stream]
            trailing_frame = "drop"
            max_frame_bytes = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.api.connect_timeout_secs, 3);
        assert_eq!(config.stream.trailing_frame, TrailingFramePolicy::Drop);
        assert_eq!(config.stream.max_frame_bytes, 1024);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ClientConfig::from_toml("[api]\nbase_url = 3").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_trailing_policy_from_str() {
        assert_eq!(
            "FLUSH".parse::<TrailingFramePolicy>().unwrap(),
            TrailingFramePolicy::Flush
        );
        assert_eq!(
            " drop ".parse::<TrailingFramePolicy>().unwrap(),
            TrailingFramePolicy::Drop
        );
        assert!("keep".parse::<TrailingFramePolicy>().is_err());
    }
}
