//! Configuration loading (dash.toml)

use anyhow::{Context, Result};
use can_dash_decoder::DashConfig;
use std::fs;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<DashConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Parse configuration from TOML text
pub fn parse_config(content: &str) -> Result<DashConfig> {
    let config: DashConfig = toml::from_str(content)?;
    Ok(config)
}

/// Apply command-line overrides and validate the result
pub fn finalize(
    mut config: DashConfig,
    interface: Option<&str>,
    bitrate: Option<u32>,
) -> Result<DashConfig> {
    if let Some(interface) = interface {
        config.bus.interface = interface.to_string();
    }
    if let Some(bitrate) = bitrate {
        config.bus.bitrate = bitrate;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
