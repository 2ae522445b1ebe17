use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Backend URL is an http(s) URL and the timeout is not 0
/// - The selected auth method has the fields it needs
/// - Stats refresh interval and event buffer are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let base_url = config.backend.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "backend.base_url cannot be empty".to_string(),
        ));
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "backend.base_url must be an http(s) URL, got '{}'",
            base_url
        )));
    }
    if config.backend.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "backend.timeout_secs cannot be 0".to_string(),
        ));
    }

    match config.auth.method {
        AuthMethod::Credentials => {
            let has_username = config.auth.username.as_deref().is_some_and(|u| !u.is_empty());
            let has_password = config.auth.password.as_deref().is_some_and(|p| !p.is_empty());
            if !has_username || !has_password {
                return Err(ConfigError::ValidationError(
                    "auth.username and auth.password must be set when using credentials auth"
                        .to_string(),
                ));
            }
        }
        AuthMethod::Token => {
            if !config.auth.token.as_deref().is_some_and(|t| !t.is_empty()) {
                return Err(ConfigError::ValidationError(
                    "auth.token must be set when using token auth".to_string(),
                ));
            }
        }
    }

    if config.stats.refresh_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "stats.refresh_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.redemption.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "redemption.event_buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}
