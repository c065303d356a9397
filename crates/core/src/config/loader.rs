use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `SHOWTUNES_SERVER_PORT=8080`.
pub const ENV_PREFIX: &str = "SHOWTUNES_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config", "sonarr_api_key"])
                .split("_"),
        )
        // Key contains an underscore, so it can't go through the split above.
        .merge(
            Env::prefixed(ENV_PREFIX)
                .only(&["sonarr_api_key"])
                .map(|_| "sonarr.api_key".into()),
        )
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config.with_default_quotas())
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    Ok(config.with_default_quotas())
}
