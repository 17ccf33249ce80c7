//! Configuration loading, validation, and management for Nexus.
//!
//! Loads configuration from `~/.nexus/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.nexus/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reasoning response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Thread store
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Data tools
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("cache", &self.cache)
            .field("sessions", &self.sessions)
            .field("tools", &self.tools)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning ↔ tool round-trips per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Events buffered between the loop and a slow caller
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Longest accepted user message, in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Inline system prompt (wins over `prompt_file`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// TOML file with a top-level `prompt` key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
}

fn default_max_steps() -> u32 {
    8
}
fn default_event_buffer() -> usize {
    64
}
fn default_max_input_chars() -> usize {
    10_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            event_buffer: default_event_buffer(),
            max_input_chars: default_max_input_chars(),
            system_prompt: None,
            prompt_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// "memory", "sqlite" or "none"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Database file for the sqlite backend
    #[serde(default = "default_cache_path")]
    pub path: String,

    /// Upper bound on in-memory entries (0 = unbounded)
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Upper bound on one cache read or write, in milliseconds
    #[serde(default = "default_cache_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_backend() -> String {
    "memory".into()
}
fn default_cache_path() -> String {
    "nexus-cache.db".into()
}
fn default_cache_max_entries() -> usize {
    10_000
}
fn default_cache_timeout_ms() -> u64 {
    250
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: default_cache_path(),
            max_entries: default_cache_max_entries(),
            timeout_ms: default_cache_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Evict idle threads after this many seconds (unset = keep forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_ttl_secs: Option<u64>,

    /// Soft cap on retained threads (unset = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Base URL of the market data service backing the stock tools
    #[serde(default = "default_market_data_url")]
    pub market_data_url: String,

    /// Tavily API key for `web_search`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,

    /// Per-call timeout for tool executors
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Per-tool TTL overrides in seconds (0 disables caching)
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,
}

fn default_market_data_url() -> String {
    "http://127.0.0.1:8890".into()
}
fn default_tool_timeout() -> u64 {
    20
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            market_data_url: default_market_data_url(),
            search_api_key: None,
            timeout_secs: default_tool_timeout(),
            ttl_overrides: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("market_data_url", &self.market_data_url)
            .field("search_api_key", &redact(&self.search_api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("ttl_overrides", &self.ttl_overrides)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8888
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".into(),
        "http://localhost:3000".into(),
    ]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.nexus/config.toml).
    ///
    /// Environment variables override the file:
    /// - `NEXUS_API_KEY`, then `OPENAI_API_KEY`
    /// - `LLM_NAME` (model), `LLM_BASE_URL`
    /// - `TAVILY_API_KEY`, `NEXUS_MARKET_DATA_URL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load a specific file, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("NEXUS_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("LLM_NAME") {
            self.model = model;
        }
        if let Some(url) = non_empty("LLM_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = non_empty("TAVILY_API_KEY") {
            self.tools.search_api_key = Some(key);
        }
        if let Some(url) = non_empty("NEXUS_MARKET_DATA_URL") {
            self.tools.market_data_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nexus")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.agent.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "agent.event_buffer must be at least 1".into(),
            ));
        }

        if self.agent.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_input_chars must be at least 1".into(),
            ));
        }

        if !matches!(self.cache.backend.as_str(), "memory" | "sqlite" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "cache.backend must be one of memory, sqlite, none (got '{}')",
                self.cache.backend
            )));
        }

        if self.cache.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cache.timeout_ms must be at least 1".into(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the system prompt: inline text first, then the prompt file.
    ///
    /// A missing or malformed prompt file is logged and treated as "no
    /// prompt" so the server still starts.
    pub fn system_prompt(&self) -> Option<String> {
        if let Some(prompt) = &self.agent.system_prompt {
            return Some(prompt.clone());
        }
        let path = self.agent.prompt_file.as_ref()?;

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Prompt file not readable");
                return None;
            }
        };

        match toml::from_str::<PromptFile>(&content) {
            Ok(file) if !file.prompt.trim().is_empty() => Some(file.prompt),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Prompt file has no 'prompt' key or it is empty");
                None
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to parse prompt file");
                None
            }
        }
    }

    /// Check if a provider API key is available.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct PromptFile {
    #[serde(default)]
    prompt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            cache: CacheConfig::default(),
            sessions: SessionsConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
