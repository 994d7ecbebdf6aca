//! Storage module for the crawl queue and content store
//!
//! This module holds all durable state of the crawler core:
//! - The task queue with atomic claiming and retry bookkeeping
//! - The deduplicated, reference-counted content store
//! - The commit protocol that moves a result from "in flight" to stored
//! - Identity- and version-level label associations
//! - Per-host politeness counters and the blocklist

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreError, StoreResult};

use crate::taxonomy::{ActionKind, StorageBackend};
use crate::{normalize_url, ChitinError};
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use std::path::Path;

/// Initializes or opens a store database
///
/// # Example
///
/// ```no_run
/// use chitin::storage::open_store;
/// use std::path::Path;
///
/// let store = open_store(Path::new("./chitin.db")).unwrap();
/// ```
pub fn open_store(path: &Path) -> Result<SqliteStore, ChitinError> {
    SqliteStore::new(path)
}

/// Formats a timestamp for storage
///
/// Fixed microsecond precision and a numeric offset keep the stored strings
/// lexicographically ordered, which the queue's SQL comparisons rely on.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// The current time, formatted for storage
pub(crate) fn now_ts() -> String {
    fmt_ts(&Utc::now())
}

/// A task handed to `enqueue` by the producer
///
/// The producer owns URL normalization and id generation; the id must be
/// globally unique and stable across restarts (a 128-bit random identifier
/// is sufficient).
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: String,
    pub url: String,
    pub url_key: String,
    pub action: ActionKind,
    pub prettify: bool,
}

impl NewTask {
    /// Builds a task from a raw URL, normalizing it and deriving its key
    pub fn from_url(
        id: impl Into<String>,
        url: &str,
        action: ActionKind,
        prettify: bool,
    ) -> Result<Self, crate::UrlError> {
        let normalized = normalize_url(url)?;
        let url_key = crate::url::url_key(&normalized);
        Ok(Self {
            id: id.into(),
            url: normalized.into(),
            url_key,
            action,
            prettify,
        })
    }
}

/// A queued task as stored
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: String,
    pub action: ActionKind,
    pub url: String,
    pub url_key: String,
    pub host: String,
    pub host_key: String,
    pub prettify: bool,
    pub enqueued_at: String,
    pub error_code: Option<String>,
    pub try_count: u32,
    pub delay_until: Option<String>,
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<String>,
}

/// The durable record representing one URL's content, shared by all of its
/// fetched versions
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: i64,
    pub url: String,
    pub url_key: String,
    pub version_count: i64,
}

/// One fetched snapshot of a content identity
#[derive(Debug, Clone)]
pub struct VersionRecord {
    pub id: String,
    pub identity_id: i64,
    pub backend: StorageBackend,
    pub action: ActionKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
    pub size: Option<i64>,
    pub hash_method: Option<String>,
    pub hash_value: Option<String>,
    pub comment: Option<String>,
}

/// A successful fetch outcome handed to the commit protocol
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub backend: StorageBackend,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub location: Option<String>,
    pub size: Option<i64>,
    pub hash_method: Option<String>,
    pub hash_value: Option<String>,
    pub comment: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl FetchResult {
    /// A result whose payload is stored inline in the database
    ///
    /// Computes size and SHA-256 integrity hash from the payload.
    pub fn inline(mime_type: impl Into<String>, payload: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        let hash_value = hex::encode(hasher.finalize());
        Self {
            backend: StorageBackend::Database,
            file_name: None,
            mime_type: Some(mime_type.into()),
            location: None,
            size: Some(payload.len() as i64),
            hash_method: Some("sha256".to_string()),
            hash_value: Some(hash_value),
            comment: None,
            payload: Some(payload),
        }
    }

    /// A result whose payload an external backend already stored
    pub fn external(
        backend: StorageBackend,
        location: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            file_name: None,
            mime_type: Some(mime_type.into()),
            location: Some(location.into()),
            size: None,
            hash_method: None,
            hash_value: None,
            comment: None,
            payload: None,
        }
    }
}

/// An externally stored payload location reported back by a purge
///
/// The content store only manages metadata; deleting the actual bytes for
/// non-inline backends is the storage collaborator's job, driven by these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLocation {
    pub version_id: String,
    pub backend: StorageBackend,
    pub location: String,
}

/// An operator-defined tag
#[derive(Debug, Clone)]
pub struct LabelRecord {
    pub id: i64,
    pub short_name: String,
    pub description: Option<String>,
}

/// Per-host fetch outcome counters
///
/// Pure bookkeeping: the backoff policy that reads these lives outside the
/// core.
#[derive(Debug, Clone)]
pub struct HostStatsRecord {
    pub host_key: String,
    pub host: String,
    pub first_seen: String,
    pub last_seen: String,
    pub success_count: i64,
    pub problem_count: i64,
}

impl HostStatsRecord {
    /// Total recorded contacts with this host
    pub fn total_contacts(&self) -> i64 {
        self.success_count + self.problem_count
    }
}

/// A host that must never be fetched
#[derive(Debug, Clone)]
pub struct BlocklistRecord {
    pub host_key: String,
    pub host: String,
    pub comment: Option<String>,
}
