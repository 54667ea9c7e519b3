//! Config file loader.

use crate::config::MatrixConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::Path;

/// Supported on-disk formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// Determine the config format from the path's extension.
pub fn detect_format(path: &Path) -> Result<ConfigFormat, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(ConfigFormat::Toml),
        Some("json") => Ok(ConfigFormat::Json),
        Some(other) => Err(ConfigError::UnsupportedFormat(format!(
            "expected .toml or .json, got .{}",
            other
        ))),
        None => Err(ConfigError::UnsupportedFormat(
            "configuration file must have a .toml or .json extension".to_string(),
        )),
    }
}

/// Parse config text in the given format. Missing fields take defaults.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<MatrixConfig, ConfigError> {
    let config = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    Ok(config)
}

/// Load config from a TOML or JSON file.
pub fn load_config_from_file(path: &Path) -> Result<MatrixConfig, ConfigError> {
    let format = detect_format(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.display().to_string())
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let config = parse_config(&content, format)?;
    log::debug!(
        "[Config] Loaded {} version(s) from {}",
        config.versions.len(),
        path.display()
    );
    Ok(config)
}
