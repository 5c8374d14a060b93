use std::path::Path;

use anyhow::{Context, Result};
use asteroids::SessionConfig;

/// Reads a session config from a TOML file, or falls back to defaults.
pub fn load(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid config in {}", path.display()))
}

fn parse(text: &str) -> Result<SessionConfig> {
    Ok(toml::from_str(text)?)
}
