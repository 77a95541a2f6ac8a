/// `load_config` module: reads the static YAML config and the provider secrets from the environment.
///
/// The YAML file never holds tokens. Every field is optional; a missing file
/// section falls back to the defaults of [`ExportConfig`]. Tokens are looked up
/// per provider only when that provider is actually used.
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use photo_export_core::config::ExportConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const VK_TOKEN_ENV: &str = "VK_TOKEN";
pub const INSTAGRAM_TOKEN_ENV: &str = "INSTAGRAM_TOKEN";
pub const YANDEX_DISK_TOKEN_ENV: &str = "YANDEX_DISK_TOKEN";
pub const GOOGLE_DRIVE_TOKEN_ENV: &str = "GOOGLE_DRIVE_TOKEN";

/// Loads the export config from `path`, or the defaults when no path is given.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<ExportConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        let config = ExportConfig::default();
        config.trace_loaded();
        return Ok(config);
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    // An empty document deserializes to unit, not to a defaulted struct.
    let config: ExportConfig = if content.trim().is_empty() {
        ExportConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            anyhow!("Failed to parse config YAML: {e}")
        })?
    };

    if config.max_photos == 0 {
        return Err(anyhow!("max_photos must be at least 1"));
    }
    config.trace_loaded();
    Ok(config)
}

/// Reads a provider token from the environment.
pub fn token_from_env(var: &str) -> Result<String> {
    match env::var(var) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => {
            error!(env_var = var, "Missing provider token");
            Err(anyhow!("environment variable {var} must be set"))
        }
    }
}
