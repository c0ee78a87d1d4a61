#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Whether the configured model can interpret image attachments.
    #[serde(default = "default_true")]
    pub supports_vision: bool,

    /// Keep per-session conversation history keyed by the client token.
    /// When disabled every request runs in a fresh session.
    #[serde(default = "default_true")]
    pub session_memory: bool,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default)]
    pub temperature: f32,

    /// Full replacement for the built-in support/sales persona.
    pub persona: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            supports_vision: true,
            session_memory: true,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            persona: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub tavily: TavilyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Env var holding the API key. The key itself never lives in the file.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            base_url: default_gemini_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyConfig {
    #[serde(default = "default_tavily_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_tavily_base_url")]
    pub base_url: String,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_tavily_key_env(),
            base_url: default_tavily_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Idle seconds before a session is evicted from the in-memory store.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            session_timeout_secs: default_session_timeout(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_max_results: default_search_max_results(),
            search_timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_tokens() -> usize {
    2048
}

fn default_gemini_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_tavily_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_session_timeout() -> u64 {
    30 * 60
}

fn default_max_sessions() -> usize {
    100
}

fn default_search_max_results() -> usize {
    3
}

fn default_search_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load from a TOML file. A missing file is not an error: defaults apply,
    /// so the binary runs with nothing but env vars set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::path::PathBuf::from("atendente.toml"),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}
