//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.pizzabot/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Outbound connector settings.
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Bot behavior (form limits, session storage).
    #[serde(default)]
    pub bot: BotConfig,
}

/// Gateway bind, port, and auth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3978).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Auth settings. When absent, defaults to no auth for loopback bind.
    #[serde(default)]
    pub auth: GatewayAuthConfig,
}

/// Gateway auth: bearer token or none (loopback-only when none).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayAuthConfig {
    /// "none" = no shared secret (only safe when bind is loopback). "token" = require `Authorization: Bearer <token>`.
    #[serde(default)]
    pub mode: GatewayAuthMode,

    /// Shared secret for inbound activity posts. Overridden by PIZZABOT_GATEWAY_TOKEN env.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayAuthMode {
    /// No auth; allow only when bind is loopback.
    #[default]
    None,

    /// Require the bearer token to match the configured token.
    Token,
}

fn default_gateway_port() -> u16 {
    3978
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            auth: GatewayAuthConfig::default(),
        }
    }
}

/// Where replies are posted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// Overrides the service url carried by each activity (e.g. a local emulator). Unset = use the activity's.
    pub service_url: Option<String>,
    /// Bearer token sent with outbound replies. Overridden by PIZZABOT_CONNECTOR_TOKEN env.
    pub token: Option<String>,
}

/// Bot behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// Consecutive invalid replies to one form prompt before the form is cancelled (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Directory for per-conversation form sessions. Unset = in memory only. Relative paths are resolved against the config file's parent.
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            sessions_dir: None,
        }
    }
}

/// Non-empty trimmed env var, or the trimmed non-empty config value.
fn env_or(var: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the gateway token: env PIZZABOT_GATEWAY_TOKEN overrides config.
pub fn resolve_gateway_token(config: &Config) -> Option<String> {
    env_or("PIZZABOT_GATEWAY_TOKEN", config.gateway.auth.token.as_ref())
}

/// Resolve the outbound connector token: env PIZZABOT_CONNECTOR_TOKEN overrides config.
pub fn resolve_connector_token(config: &Config) -> Option<String> {
    env_or("PIZZABOT_CONNECTOR_TOKEN", config.connector.token.as_ref())
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PIZZABOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".pizzabot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Resolve the sessions directory: relative paths are resolved against the config file's parent.
pub fn resolve_sessions_dir(config: &Config, config_path: &Path) -> Option<PathBuf> {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.bot.sessions_dir {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                Some(d.clone())
            } else {
                Some(config_parent.join(d))
            }
        }
        _ => None,
    }
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used (for resolving relative paths).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
