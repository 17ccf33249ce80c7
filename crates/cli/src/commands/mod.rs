//! Subcommand implementations.

pub mod chat;
pub mod serve;
pub mod tools;

use std::path::Path;

use nexus_config::AppConfig;

/// Load configuration from `path`, or from `~/.nexus/config.toml` when unset.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, String> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))
}
