use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use chitin::config::load_config;
///
/// let config = load_config(Path::new("chitin.toml")).unwrap();
/// println!("Lease: {}s", config.queue.lease_seconds);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Used to detect configuration changes between runs.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_temp_config(
            r#"
            [store]
            database-path = "./chitin.db"
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.store.database_path, "./chitin.db");
        assert_eq!(config.queue.lease_seconds, 900);
        assert_eq!(config.labels.sweep_retention_days, 30);
        assert!(config.blocklist.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_temp_config(
            r#"
            [store]
            database-path = "./chitin.db"

            [queue]
            lease-seconds = 120

            [labels]
            sweep-retention-days = 7

            [[blocklist]]
            host = "tracker.example.com"
            comment = "ad tracker"

            [[blocklist]]
            host = "spam.example.org"
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.queue.lease_seconds, 120);
        assert_eq!(config.labels.sweep_retention_days, 7);
        assert_eq!(config.blocklist.len(), 2);
        assert_eq!(config.blocklist[0].host, "tracker.example.com");
        assert_eq!(config.blocklist[0].comment.as_deref(), Some("ad tracker"));
        assert_eq!(config.blocklist[1].comment, None);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let file = write_temp_config("this is not toml [");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_hash_stable() {
        let file = write_temp_config("[store]\ndatabase-path = \"a.db\"\n");
        let h1 = compute_config_hash(file.path()).unwrap();
        let h2 = compute_config_hash(file.path()).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_config_hash_changes_with_content() {
        let a = write_temp_config("[store]\ndatabase-path = \"a.db\"\n");
        let b = write_temp_config("[store]\ndatabase-path = \"b.db\"\n");
        assert_ne!(
            compute_config_hash(a.path()).unwrap(),
            compute_config_hash(b.path()).unwrap()
        );
    }
}
