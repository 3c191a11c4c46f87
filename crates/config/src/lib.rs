//! Configuration loading, validation, and management for Forgeloop.
//!
//! Loads configuration from `~/.forgeloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.forgeloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider endpoint and sampling settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Workspace the file tools operate on
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Tool dispatch settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Diagnostic capture
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
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
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("workspace", &self.workspace)
            .field("tools", &self.tools)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Hard ceiling on request rounds per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Minimum interval between streaming redraws
    #[serde(default = "default_redisplay_interval")]
    pub redisplay_interval_ms: u64,

    /// Timeout for background auxiliary work
    #[serde(default = "default_background_timeout")]
    pub background_timeout_secs: u64,

    /// Token budget for the history sent with each request
    #[serde(default = "default_context_window")]
    pub context_window_tokens: usize,

    /// Save a short note to memory after each successful file write
    #[serde(default)]
    pub learn_from_writes: bool,

    /// Override the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_redisplay_interval() -> u64 {
    100
}
fn default_background_timeout() -> u64 {
    30
}
fn default_context_window() -> usize {
    64_000
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            redisplay_interval_ms: default_redisplay_interval(),
            background_timeout_secs: default_background_timeout(),
            context_window_tokens: default_context_window(),
            learn_from_writes: false,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory; defaults to the current directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,
}

fn default_forbidden_paths() -> Vec<String> {
    vec![".git".into(), ".env".into(), "~/.ssh".into(), "~/.aws".into()]
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            forbidden_paths: default_forbidden_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum length of an error message fed back to the model
    #[serde(default = "default_max_error_chars")]
    pub max_error_chars: usize,

    /// Expose the git_* tools
    #[serde(default = "default_true")]
    pub git_enabled: bool,
}

fn default_max_error_chars() -> usize {
    2000
}
fn default_true() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_error_chars: default_max_error_chars(),
            git_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Append every raw stream frame to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_log_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.forgeloop/config.toml).
    ///
    /// Environment overrides:
    /// - `FORGELOOP_API_KEY`, then `OPENAI_API_KEY`
    /// - `FORGELOOP_API_URL`
    /// - `FORGELOOP_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("FORGELOOP_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("FORGELOOP_API_URL") {
            self.provider.api_url = url;
        }
        if let Some(model) = lookup("FORGELOOP_MODEL") {
            self.provider.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".forgeloop")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            problems.push("provider.temperature must be between 0.0 and 2.0".to_string());
        }
        if self.agent.max_iterations == 0 {
            problems.push("agent.max_iterations must be at least 1".to_string());
        }
        if self.agent.redisplay_interval_ms == 0 {
            problems.push("agent.redisplay_interval_ms must be > 0".to_string());
        }
        if self.tools.max_error_chars < 16 {
            problems.push("tools.max_error_chars must be at least 16".to_string());
        }
        if !self.provider.api_url.starts_with("http://")
            && !self.provider.api_url.starts_with("https://")
        {
            problems.push(format!(
                "provider.api_url must be an http(s) URL, got '{}'",
                self.provider.api_url
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(problems.join("; ")))
        }
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The workspace root, falling back to the current directory.
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace
            .root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            agent: AgentSettings::default(),
            workspace: WorkspaceConfig::default(),
            tools: ToolsConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
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
