//! Application configuration management
//!
//! This module handles loading and validating configuration from an optional
//! TOML file, a `.env` file and the process environment. All configuration is
//! validated at startup; only the credential is re-checked per request.

use crate::core::constants::{API_KEY_ENV, upstream};
use anyhow::{Context, Result, bail};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 90;

/// Default number of upstream attempts per relay request
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff delay in milliseconds
const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default upper bound of the random jitter in milliseconds
const DEFAULT_MAX_JITTER_MS: u64 = 500;

/// Default server port
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: None,
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

fn default_base_url() -> String {
    upstream::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    upstream::DEFAULT_MODEL.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_jitter_ms() -> u64 {
    DEFAULT_MAX_JITTER_MS
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub request: RequestConfig,
}

/// Application configuration
///
/// Immutable after startup and shared between requests behind an `Arc`.
/// The credential is kept as a secret so `Debug` output never reveals it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key, if configured
    pub(crate) api_key: Option<SecretString>,

    /// Gemini model resource base URL
    pub base_url: String,

    /// Model used for generation
    pub model: String,

    /// Optional sampling temperature forwarded upstream
    pub temperature: Option<f32>,

    /// Optional output token cap forwarded upstream
    pub max_output_tokens: Option<u32>,

    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Logging level
    pub log_level: String,

    /// Upstream request timeout in seconds
    pub request_timeout: u64,

    /// Maximum upstream attempts per relay request
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter in milliseconds
    pub max_jitter_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default())
    }
}

impl Config {
    fn from_toml(config: TomlConfig) -> Self {
        Config {
            api_key: None,
            base_url: config.gemini.base_url,
            model: config.gemini.model,
            temperature: config.gemini.temperature,
            max_output_tokens: config.gemini.max_output_tokens,
            host: config.server.host,
            port: config.server.port,
            log_level: config.server.log_level,
            request_timeout: config.request.request_timeout,
            max_attempts: config.request.max_attempts,
            base_delay_ms: config.request.base_delay_ms,
            max_jitter_ms: config.request.max_jitter_ms,
        }
        .with_api_key(config.gemini.api_key)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if the TOML cannot be parsed or a value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        let config = Self::from_toml(config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if a value is
    /// out of range.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from environment and optional config file
    ///
    /// Reads `.env` if present, then `$CONFIG_PATH` (default `config.toml`)
    /// if it exists. `GEMINI_API_KEY` overrides the file's `api_key`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
                .with_context(|| format!("Invalid configuration in {}", config_path))?
        } else {
            Self::default()
        };

        Ok(config.with_env_api_key(std::env::var(API_KEY_ENV).ok()))
    }

    /// Replace the credential; empty values count as absent
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::new);
        self
    }

    /// Override the credential with an environment value when one is set
    pub fn with_env_api_key(self, env_value: Option<String>) -> Self {
        match env_value {
            Some(key) if !key.trim().is_empty() => self.with_api_key(Some(key)),
            _ => self,
        }
    }

    /// The credential, if present and non-empty
    ///
    /// Checked on every relay request rather than trusted from startup.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            bail!("request.max_attempts must be at least 1");
        }
        if self.port == 0 {
            bail!("server.port must be non-zero");
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                bail!("gemini.temperature must be between 0.0 and 2.0, got {}", temperature);
            }
        }
        Ok(())
    }
}
