//! URL handling module
//!
//! This module provides URL normalization, host extraction, and the
//! content-address key derivation used to deduplicate crawled URLs and to
//! key per-host bookkeeping.

mod domain;
mod keys;
mod normalize;

pub use domain::extract_host;
pub use keys::{host_key, url_key};
pub use normalize::normalize_url;
