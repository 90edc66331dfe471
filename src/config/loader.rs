//! Layered configuration loading
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. `/etc/batchguard/config.toml`
//! 3. `$XDG_CONFIG_HOME/batchguard/config.toml`
//! 4. `~/.batchguard.toml`
//! 5. `./.batchguard.toml`
//! 6. The `--config` file
//! 7. `BATCHGUARD_` environment variables

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

const APP_NAME: &str = "batchguard";

/// Prefix for environment overrides, e.g. `BATCHGUARD_RUNNER__TIMEOUT_SECS=600`
pub const ENV_PREFIX: &str = "BATCHGUARD_";

/// Search paths for config files, lowest priority first. None need exist.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc").join(APP_NAME).join("config.toml")];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{}.toml", APP_NAME)));
    }
    paths.push(PathBuf::from(format!(".{}.toml", APP_NAME)));

    paths
}

/// Config files that will be merged, in merge order
///
/// Search paths that do not exist are skipped. An explicit `override_path`
/// must exist.
pub fn config_layers(override_path: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut layers: Vec<PathBuf> = config_paths().into_iter().filter(|p| p.is_file()).collect();

    if let Some(path) = override_path {
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        layers.push(path.to_path_buf());
    }

    Ok(layers)
}

/// Build the figment for the given files without environment overrides
fn file_figment(layers: &[PathBuf]) -> Figment {
    layers.iter().fold(
        Figment::from(Serialized::defaults(Config::default())),
        |figment, path| {
            tracing::debug!("Loading config from: {}", path.display());
            figment.merge(Toml::file(path))
        },
    )
}

/// Load the merged configuration
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let layers = config_layers(override_path)?;

    file_figment(&layers)
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")
}
