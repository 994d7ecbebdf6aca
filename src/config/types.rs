use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub blocklist: Vec<BlockEntry>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Queue behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// How long a claimed task is leased to a worker before it becomes
    /// reclaimable (seconds)
    #[serde(rename = "lease-seconds", default = "default_lease_seconds")]
    pub lease_seconds: u64,
}

/// Label housekeeping configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LabelConfig {
    /// Identity-level labels whose URL key has neither content nor a queued
    /// task are swept once they are older than this (days)
    #[serde(rename = "sweep-retention-days", default = "default_retention_days")]
    pub sweep_retention_days: u64,
}

/// A host that must never be fetched
#[derive(Debug, Clone, Deserialize)]
pub struct BlockEntry {
    /// Host name (e.g. "tracker.example.com")
    pub host: String,

    /// Optional operator note explaining the block
    pub comment: Option<String>,
}

fn default_lease_seconds() -> u64 {
    900
}

fn default_retention_days() -> u64 {
    30
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_seconds: default_lease_seconds(),
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            sweep_retention_days: default_retention_days(),
        }
    }
}
