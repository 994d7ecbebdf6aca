use crate::config::types::Config;
use crate::ConfigError;

/// Validates a parsed configuration
///
/// Checks the constraints TOML deserialization cannot express: non-empty
/// paths, a positive lease, and well-formed blocklist hosts.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.store.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store.database-path must not be empty".to_string(),
        ));
    }

    if config.queue.lease_seconds == 0 {
        return Err(ConfigError::Validation(
            "queue.lease-seconds must be greater than zero".to_string(),
        ));
    }

    for entry in &config.blocklist {
        let host = entry.host.trim();
        if host.is_empty() {
            return Err(ConfigError::Validation(
                "blocklist entries must name a host".to_string(),
            ));
        }
        if host.contains('/') || host.contains(' ') {
            return Err(ConfigError::Validation(format!(
                "blocklist host '{}' must be a bare host name, not a URL",
                entry.host
            )));
        }
    }

    Ok(())
}
