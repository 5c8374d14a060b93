use std::path::Path;

use anyhow::{Context, Result};
use asteroids::SessionConfig;

pub fn load(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
        }
        None => Ok(SessionConfig::default()),
    }
}
