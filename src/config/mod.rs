//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files.
//!
//! # Example
//!
//! ```no_run
//! use chitin::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("chitin.toml")).unwrap();
//! println!("Database at: {}", config.store.database_path);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BlockEntry, Config, LabelConfig, QueueConfig, StoreConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
