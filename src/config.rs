use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Upstream model endpoints. The first entry is the default model.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub turn: TurnConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load configuration from a YAML file, expanding `${VAR}` references.
    /// A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_seconds: u64,
    /// Cap on concurrently processed requests.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Cap on inbound request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            keep_alive_interval_seconds: default_keep_alive_interval(),
            max_connections: default_max_connections(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ============================================================================
// StoreConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per session.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    /// Idle lifetime after which a session record is treated as gone.
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
            ttl_seconds: default_session_ttl(),
        }
    }
}

// ============================================================================
// ModelConfig
// ============================================================================

/// One upstream OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model reference clients use to select this entry.
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

// ============================================================================
// TurnConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TurnConfig {
    /// Hard ceiling on one turn, model calls and tools included.
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_seconds: u64,
    /// Reconnect attempts when a session's tool transport is gone.
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_timeout_seconds: default_turn_timeout(),
            reconnect_attempts: default_reconnect_attempts(),
        }
    }
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_keep_alive_interval() -> u64 {
    15
}

fn default_max_connections() -> usize {
    256
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from(".reqflow/sessions")
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

fn default_turn_timeout() -> u64 {
    180
}

fn default_reconnect_attempts() -> u32 {
    2
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports shell-compatible syntax:
/// - `${VAR}` - required variable, errors if not set
/// - `${VAR:-default}` - optional variable with default value
/// - `$$` - escaped `$` (only needed before `{`)
///
/// Nested references (`${A:-${B}}`) are not supported, and an unclosed
/// `${` is an error.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                result.push_str(&parse_var_reference(&mut chars)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Parse a variable reference after the opening `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;
    let mut closed = false;

    while let Some(&c) = chars.peek() {
        match c {
            '}' => {
                chars.next();
                closed = true;
                break;
            }
            ':' if default_value.is_none() => {
                chars.next();
                if chars.peek() == Some(&'-') {
                    chars.next();
                    default_value = Some(String::new());
                } else {
                    var_name.push(':');
                }
            }
            _ => {
                chars.next();
                match default_value.as_mut() {
                    Some(default) => default.push(c),
                    None => var_name.push(c),
                }
            }
        }
    }

    if !closed {
        return Err(ConfigError::UnclosedVarReference);
    }

    match std::env::var(&var_name) {
        Ok(value) => Ok(value),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(var_name)),
    }
}

// ============================================================================
// Tests
// ============================================================================
