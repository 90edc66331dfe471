//! Configuration module for batchguard
//!
//! Provides XDG-compliant layered configuration loading.

pub mod loader;
pub mod model;

pub use loader::{config_layers, config_paths, load_config, ENV_PREFIX};
pub use model::*;
