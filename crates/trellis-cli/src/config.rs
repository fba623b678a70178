use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use trellis_core::BuilderOptions;

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("trellis").join("config.toml"))
}

/// Loads builder options from `path`, or from the user config file when it
/// exists, or falls back to the defaults.
pub fn load(path: Option<&Path>) -> Result<BuilderOptions> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => return Ok(BuilderOptions::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    let options = BuilderOptions::from_toml_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), plugins = ?options.plugins, "Loaded builder config");
    Ok(options)
}
