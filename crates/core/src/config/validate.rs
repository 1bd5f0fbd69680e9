use super::{types::Config, ConfigError};
use crate::announce::Locale;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Retry, buffer and refresh settings are positive
/// - Announcement locale is supported
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.dispatch.max_conflict_retries == 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.max_conflict_retries must be at least 1".to_string(),
        ));
    }

    if config.announcement.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "announcement.buffer_size must be at least 1".to_string(),
        ));
    }

    if config.announcement.locale.parse::<Locale>().is_err() {
        return Err(ConfigError::ValidationError(format!(
            "announcement.locale '{}' is not supported (expected pt-BR or en-US)",
            config.announcement.locale
        )));
    }

    if config.view.refresh_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "view.refresh_interval_secs must be at least 1".to_string(),
        ));
    }

    Ok(())
}
