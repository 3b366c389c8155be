//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use crate::config::default_store_path;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default(
            "storage.store_path",
            default_store_path().to_string_lossy().to_string(),
        )?
        .set_default("logging.level", "info")?
        .set_default("logging.output", "stderr")
}
