//! Locating and loading the configuration file

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{RawConfig, SyncConfig};

/// Looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "sheetsync.toml";

/// Looked up under the user config directory
pub const USER_CONFIG_FILE: &str = "config.toml";

const APP_DIR: &str = "sheetsync";

/// `<config dir>/sheetsync/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(USER_CONFIG_FILE))
}

/// Pick the configuration file to read, if any
///
/// An explicit path always wins and must exist. Otherwise the first existing
/// candidate is used.
pub fn locate_config(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            anyhow::bail!("Config file does not exist: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    Ok(candidates.iter().find(|p| p.is_file()).cloned())
}

/// Load the file (when one is found), apply environment overrides and validate
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig> {
    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    candidates.extend(user_config_path());

    let mut raw = match locate_config(explicit, &candidates)? {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            read_config_file(&path)?
        }
        None => {
            log::info!("No config file found, using environment only");
            RawConfig::default()
        }
    };

    raw.apply_env(|key| std::env::var(key).ok());
    Ok(raw.resolve()?)
}

fn read_config_file(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    RawConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
