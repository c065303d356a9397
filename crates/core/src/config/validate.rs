use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Storage directory and dedup store name are set
/// - Every quota is consistent
/// - Sonarr, when present, has a URL and API key
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Storage validation
    if config.storage.dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.dir cannot be empty".to_string(),
        ));
    }
    if config.storage.flush_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "storage.flush_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.orchestrator.dedup_store.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "orchestrator.dedup_store cannot be empty".to_string(),
        ));
    }

    // Quota validation
    for (service, quota) in &config.quotas {
        quota
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("quotas.{}: {}", service, e)))?;
    }

    // Sonarr validation
    if let Some(sonarr) = &config.sonarr {
        if sonarr.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sonarr.url cannot be empty".to_string(),
            ));
        }
        if sonarr.api_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "sonarr.api_key cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
