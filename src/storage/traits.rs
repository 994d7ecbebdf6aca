//! Store trait and error types
//!
//! This module defines the trait interface for the durable store backing the
//! queue, the content store, labels, host statistics, and the blocklist.

use crate::storage::{
    BlocklistRecord, ExternalLocation, FetchResult, HostStatsRecord, IdentityRecord, LabelRecord,
    NewTask, TaskRecord, VersionRecord,
};
use crate::taxonomy::{ActionKind, FailureKind};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown failure kind: {0}")]
    UnknownFailureKind(String),

    #[error("Task id already queued: {0}")]
    DuplicateTask(String),

    #[error("Version id already committed: {0}")]
    IntegrityError(String),

    #[error("Host is blocked: {0}")]
    BlockedHost(String),

    #[error("Identity not found: {0}")]
    IdentityNotFound(i64),

    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    #[error("Task URL is malformed: {0}")]
    MalformedTaskUrl(String),

    #[error("Invalid fetch result: {0}")]
    InvalidResult(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for the durable store backing the crawler core
///
/// All mutating operations are transactional: either every record change in
/// an operation becomes durable, or none does. Implementations must make
/// `claim_next` and `commit` safe under concurrent callers sharing the same
/// database.
pub trait Store {
    // ===== Task Queue =====

    /// Adds a task to the queue
    ///
    /// Fails with `BlockedHost` if the task's host is on the blocklist and
    /// with `DuplicateTask` if the id is already queued.
    fn enqueue(&mut self, task: &NewTask) -> StoreResult<()>;

    /// Atomically selects and claims the next eligible task
    ///
    /// Eligible means: no permanent failure recorded, any retry delay has
    /// elapsed, the action is a supported code, the host is not blocked, and
    /// the task is unclaimed or its previous claim's lease has expired.
    /// Tasks are taken oldest first (FIFO by enqueue time, ties by id).
    ///
    /// Claiming stamps the worker name and a lease expiry on the task, and
    /// clears a previously recorded transient failure so the new attempt
    /// starts clean. Returns `None` when no eligible task exists.
    fn claim_next(&mut self, worker: &str, lease: Duration) -> StoreResult<Option<TaskRecord>>;

    /// Returns the task `claim_next` would take, without claiming it
    ///
    /// Read-only inspection for operators and the run loop; never use this
    /// to hand work to a worker.
    fn next_eligible(&self) -> StoreResult<Option<TaskRecord>>;

    /// Gets a task by id
    fn get_task(&self, task_id: &str) -> StoreResult<Option<TaskRecord>>;

    /// Records a failed attempt against a task
    ///
    /// Increments the try counter and stamps the failure code. For
    /// transient kinds a `retry_after` sets the earliest next attempt; a
    /// permanent kind excludes the task from selection forever but retains
    /// it for audit. The claim is released either way.
    ///
    /// Fails with `UnknownTask` if the id does not exist and with
    /// `UnknownFailureKind` if the kind is not in the seeded taxonomy.
    fn record_failure(
        &mut self,
        task_id: &str,
        kind: &FailureKind,
        retry_after: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Unconditionally deletes a task
    ///
    /// Used by the commit protocol and for operator-driven purges.
    /// Identity-level labels tied to the task's URL key are purged only if
    /// no content identity exists for that key and no other queued task
    /// shares it; otherwise they are left for the survivor.
    fn remove_task(&mut self, task_id: &str) -> StoreResult<()>;

    /// Counts all queued tasks
    fn count_queued(&self) -> StoreResult<u64>;

    /// Counts queued tasks whose recorded failure is transient
    ///
    /// The run loop keeps polling while this is non-zero: those tasks may
    /// clear once their delay elapses.
    fn count_transient_failures(&self) -> StoreResult<u64>;

    /// Counts queued tasks whose recorded failure is permanent
    fn count_permanent_failures(&self) -> StoreResult<u64>;

    // ===== Content Store =====

    /// Returns the identity for a URL key, creating it if absent
    fn find_or_create_identity(&mut self, url: &str, url_key: &str) -> StoreResult<i64>;

    /// Adds a version to an identity
    ///
    /// Inserts the version row, increments the identity's version count in
    /// the same transaction, and stores the payload inline when the backend
    /// is the database. The version id space is the task id space, so a
    /// duplicate id (`IntegrityError`) doubles as a double-commit guard.
    fn add_version(
        &mut self,
        identity_id: i64,
        version_id: &str,
        action: ActionKind,
        result: &FetchResult,
    ) -> StoreResult<()>;

    /// Removes a version, its inline payload, and its version-level labels
    ///
    /// Decrements the identity's version count and deletes the identity
    /// when the count reaches zero. Idempotent: removing an absent version
    /// is a no-op, and the count is never decremented twice for one row.
    fn remove_version(&mut self, version_id: &str) -> StoreResult<()>;

    /// Removes every version of an identity and then the identity itself
    ///
    /// Returns the externally stored payload locations (non-database
    /// backends) so the caller can hand them to the storage collaborator
    /// for deletion; the metadata store does not own those bytes.
    fn remove_all_versions(&mut self, identity_id: i64) -> StoreResult<Vec<ExternalLocation>>;

    /// Gets the identity for a URL key
    fn identity_by_key(&self, url_key: &str) -> StoreResult<Option<IdentityRecord>>;

    /// Gets all versions of an identity, oldest first
    fn versions_for_identity(&self, identity_id: i64) -> StoreResult<Vec<VersionRecord>>;

    /// Gets the inline payload of a version, if it has one
    fn inline_payload(&self, version_id: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Counts content identities
    fn count_identities(&self) -> StoreResult<u64>;

    /// Counts content versions
    fn count_versions(&self) -> StoreResult<u64>;

    // ===== Commit Protocol =====

    /// Commits a task's fetch result as one atomic unit
    ///
    /// Finds or creates the identity for the task's URL key, adds a version
    /// carrying the task's id, and removes the task from the queue; either
    /// all of it becomes durable or none of it. On failure the transaction
    /// rolls back and the task is marked with a transient commit failure so
    /// it is retried rather than lost.
    ///
    /// Returns the identity id the version was attached to.
    fn commit(&mut self, task: &TaskRecord, result: &FetchResult) -> StoreResult<i64>;

    // ===== Labels =====

    /// Creates a label, or returns the existing one with this short name
    fn create_label(&mut self, short_name: &str, description: Option<&str>) -> StoreResult<i64>;

    /// All labels, sorted by short name
    fn labels(&self) -> StoreResult<Vec<LabelRecord>>;

    /// Deletes a label and every association carrying it
    ///
    /// No-op if no label with this short name exists.
    fn delete_label(&mut self, short_name: &str) -> StoreResult<()>;

    /// Attaches a label to a URL key
    ///
    /// The key does not need to correspond to any existing identity or
    /// task: tagging works before the first fetch and survives task
    /// removal, and applies to whatever identity the key eventually gets.
    fn attach_label_to_key(&mut self, short_name: &str, url_key: &str) -> StoreResult<()>;

    /// Attaches a label to an existing content version
    fn attach_label_to_version(&mut self, short_name: &str, version_id: &str) -> StoreResult<()>;

    /// Detaches a label from a URL key (no-op if not attached)
    fn detach_label_from_key(&mut self, short_name: &str, url_key: &str) -> StoreResult<()>;

    /// Detaches a label from a version (no-op if not attached)
    fn detach_label_from_version(&mut self, short_name: &str, version_id: &str)
        -> StoreResult<()>;

    /// Label short names attached to a URL key, sorted
    fn labels_for_key(&self, url_key: &str) -> StoreResult<Vec<String>>;

    /// Label short names attached to a version, sorted
    fn labels_for_version(&self, version_id: &str) -> StoreResult<Vec<String>>;

    /// Ids of every version carrying the given label, sorted
    fn version_ids_labeled(&self, short_name: &str) -> StoreResult<Vec<String>>;

    /// Deletes identity-level label associations older than `cutoff` whose
    /// URL key has neither a content identity nor a queued task
    ///
    /// Returns the number of associations removed.
    fn sweep_orphan_key_labels(&mut self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    // ===== Host Politeness =====

    /// Records the outcome of one fetch attempt against a host
    ///
    /// Upserts the host's counters and maintains first/last contact times.
    fn record_host_outcome(&mut self, host: &str, success: bool) -> StoreResult<()>;

    /// Gets the recorded statistics for a host
    fn host_stats(&self, host: &str) -> StoreResult<Option<HostStatsRecord>>;

    // ===== Blocklist =====

    /// Adds a host to the blocklist (updates the comment if already there)
    fn block_host(&mut self, host: &str, comment: Option<&str>) -> StoreResult<()>;

    /// Removes a host from the blocklist (no-op if absent)
    fn unblock_host(&mut self, host: &str) -> StoreResult<()>;

    /// Returns true if the host is blocked
    fn is_blocked(&self, host: &str) -> StoreResult<bool>;

    /// All blocklist entries, sorted by host
    fn blocked_hosts(&self) -> StoreResult<Vec<BlocklistRecord>>;
}
