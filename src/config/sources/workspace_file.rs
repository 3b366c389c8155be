//! Workspace config files: `config/config.toml`, then `config/{STANDBY_ENV}.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_ENV: &str = "development";

/// Active environment name from `STANDBY_ENV`; blank values fall back to the default.
pub fn active_env() -> String {
    std::env::var("STANDBY_ENV")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ENV.to_string())
}

/// Existing workspace config files, lowest precedence first.
pub fn existing_files(workspace_root: &Path, env_name: &str) -> Vec<PathBuf> {
    let config_dir = workspace_root.join("config");
    [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ]
    .into_iter()
    .filter(|path| path.is_file())
    .collect()
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env_name = active_env();
    let files = existing_files(workspace_root, &env_name);
    debug!(env = %env_name, files = files.len(), "Workspace configuration");

    Ok(files
        .into_iter()
        .fold(builder, |builder, path| builder.add_source(File::from(path))))
}
