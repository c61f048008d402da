//! Initialize the configuration directory: create ~/.pizzabot and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Create the config directory and default config if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with the default settings if missing.
/// - Creates the `sessions` subdirectory for persisted form sessions.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let mut config = Config::default();
        config.bot.sessions_dir = Some(PathBuf::from("sessions"));
        let json = serde_json::to_string_pretty(&config).context("serializing default config")?;
        std::fs::write(config_path, json)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    let sessions = config_dir.join("sessions");
    if !sessions.exists() {
        std::fs::create_dir_all(&sessions)
            .with_context(|| format!("creating sessions directory {}", sessions.display()))?;
        log::info!("created sessions directory at {}", sessions.display());
    }

    Ok(config_dir.to_path_buf())
}
