//! SQLite store implementation
//!
//! This module provides the SQLite-based implementation of the Store trait.
//!
//! Concurrency model: several workers may share one database file, each
//! through its own connection. WAL mode plus a busy timeout serialize the
//! writers; `claim_next` and `commit` run under IMMEDIATE transactions so
//! selection-and-claim and the multi-row commit are single atomic units.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StoreError, StoreResult};
use crate::storage::{
    fmt_ts, now_ts, BlocklistRecord, ExternalLocation, FetchResult, HostStatsRecord,
    IdentityRecord, LabelRecord, NewTask, TaskRecord, VersionRecord,
};
use crate::taxonomy::{ActionKind, FailureKind, StorageBackend};
use crate::url::{extract_host, host_key};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Selects the oldest eligible task. `?1` is the current time.
const NEXT_ELIGIBLE_SQL: &str = "
    SELECT q.id, q.action, q.url, q.url_key, q.host, q.host_key, q.prettify,
           q.enqueued_at, q.error_code, q.try_count, q.delay_until,
           q.claimed_by, q.lease_expires_at
    FROM queue q
    LEFT JOIN failure_kinds f ON q.error_code = f.code
    WHERE (q.error_code IS NULL OR f.permanent = 0)
      AND (q.delay_until IS NULL OR q.delay_until <= ?1)
      AND q.action IN (SELECT code FROM actions)
      AND q.host_key NOT IN (SELECT host_key FROM blocklist)
      AND (q.claimed_by IS NULL OR q.lease_expires_at IS NULL OR q.lease_expires_at <= ?1)
    ORDER BY q.enqueued_at ASC, q.id ASC
    LIMIT 1";

const TASK_BY_ID_SQL: &str = "
    SELECT q.id, q.action, q.url, q.url_key, q.host, q.host_key, q.prettify,
           q.enqueued_at, q.error_code, q.try_count, q.delay_until,
           q.claimed_by, q.lease_expires_at
    FROM queue q
    WHERE q.id = ?1";

const VERSION_COLUMNS_SQL: &str = "
    SELECT id, identity_id, backend, action, file_name, mime_type, location,
           created_at, size, hash_method, hash_value, comment
    FROM content_versions";

/// SQLite store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates a store database at the given path
    pub fn new(path: &Path) -> Result<Self, crate::ChitinError> {
        let conn = Connection::open(path)?;

        // WAL and a busy timeout let concurrent worker connections share
        // the file; foreign keys guard the reference tables
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, crate::ChitinError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Transaction-scoped helpers =====
    //
    // These operate on a borrowed connection so the commit protocol can run
    // them inside one transaction while the public trait methods wrap them
    // in their own.

    fn row_exists(
        conn: &Connection,
        sql: &str,
        value: &dyn rusqlite::ToSql,
    ) -> rusqlite::Result<bool> {
        conn.query_row(sql, [value], |_| Ok(()))
            .optional()
            .map(|row| row.is_some())
    }

    fn find_or_create_identity_on(
        conn: &Connection,
        url: &str,
        url_key: &str,
    ) -> StoreResult<i64> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM content_identities WHERE url_key = ?1",
                [url_key],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO content_identities (url, url_key, version_count) VALUES (?1, ?2, 0)",
            params![url, url_key],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn add_version_on(
        conn: &Connection,
        identity_id: i64,
        version_id: &str,
        action: ActionKind,
        result: &FetchResult,
    ) -> StoreResult<()> {
        validate_result(result)?;

        if Self::row_exists(
            conn,
            "SELECT 1 FROM content_versions WHERE id = ?1",
            &version_id,
        )? {
            return Err(StoreError::IntegrityError(version_id.to_string()));
        }

        if !Self::row_exists(
            conn,
            "SELECT 1 FROM content_identities WHERE id = ?1",
            &identity_id,
        )? {
            return Err(StoreError::IdentityNotFound(identity_id));
        }

        conn.execute(
            "INSERT INTO content_versions
                 (id, identity_id, backend, action, file_name, mime_type, location,
                  created_at, size, hash_method, hash_value, comment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                version_id,
                identity_id,
                result.backend.to_db_string(),
                action.to_db_string(),
                result.file_name,
                result.mime_type,
                result.location,
                now_ts(),
                result.size,
                result.hash_method,
                result.hash_value,
                result.comment,
            ],
        )?;

        conn.execute(
            "UPDATE content_identities SET version_count = version_count + 1 WHERE id = ?1",
            [identity_id],
        )?;

        if result.backend.is_inline() {
            if let Some(body) = result.payload.as_ref() {
                conn.execute(
                    "INSERT INTO inline_payloads (version_id, body) VALUES (?1, ?2)",
                    params![version_id, body],
                )?;
            }
        }

        Ok(())
    }

    /// Removes one version and everything hanging off it.
    ///
    /// Returns false if the version did not exist. The version row is the
    /// only thing that decrements the identity counter, so re-invoking for
    /// an already-removed id cannot double-decrement.
    fn remove_version_on(conn: &Connection, version_id: &str) -> StoreResult<bool> {
        let identity_id: Option<i64> = conn
            .query_row(
                "SELECT identity_id FROM content_versions WHERE id = ?1",
                [version_id],
                |row| row.get(0),
            )
            .optional()?;

        let identity_id = match identity_id {
            Some(id) => id,
            None => return Ok(false),
        };

        conn.execute(
            "DELETE FROM inline_payloads WHERE version_id = ?1",
            [version_id],
        )?;
        conn.execute(
            "DELETE FROM label_to_version WHERE version_id = ?1",
            [version_id],
        )?;
        conn.execute("DELETE FROM content_versions WHERE id = ?1", [version_id])?;
        conn.execute(
            "UPDATE content_identities SET version_count = version_count - 1 WHERE id = ?1",
            [identity_id],
        )?;
        conn.execute(
            "DELETE FROM content_identities WHERE id = ?1 AND version_count <= 0",
            [identity_id],
        )?;

        Ok(true)
    }

    fn remove_task_on(conn: &Connection, task_id: &str) -> StoreResult<()> {
        let url_key: Option<String> = conn
            .query_row("SELECT url_key FROM queue WHERE id = ?1", [task_id], |row| {
                row.get(0)
            })
            .optional()?;

        let url_key = url_key.ok_or_else(|| StoreError::UnknownTask(task_id.to_string()))?;

        conn.execute("DELETE FROM queue WHERE id = ?1", [task_id])?;

        // Identity-level labels survive as long as either an identity or
        // another queued task still carries this URL key
        let has_identity = Self::row_exists(
            conn,
            "SELECT 1 FROM content_identities WHERE url_key = ?1",
            &url_key,
        )?;
        let has_sibling =
            Self::row_exists(conn, "SELECT 1 FROM queue WHERE url_key = ?1", &url_key)?;

        if !has_identity && !has_sibling {
            let purged = conn.execute("DELETE FROM label_to_key WHERE url_key = ?1", [&url_key])?;
            if purged > 0 {
                tracing::debug!(task = %task_id, purged, "purged labels of abandoned URL key");
            }
        }

        Ok(())
    }

    fn label_id_get_or_create_on(conn: &Connection, short_name: &str) -> StoreResult<i64> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM labels WHERE short_name = ?1",
                [short_name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute("INSERT INTO labels (short_name) VALUES (?1)", [short_name])?;
        Ok(conn.last_insert_rowid())
    }
}

impl Store for SqliteStore {
    // ===== Task Queue =====

    fn enqueue(&mut self, task: &NewTask) -> StoreResult<()> {
        let parsed = Url::parse(&task.url)
            .map_err(|e| StoreError::MalformedTaskUrl(format!("{}: {}", task.url, e)))?;
        let host = extract_host(&parsed)
            .ok_or_else(|| StoreError::MalformedTaskUrl(format!("{}: no host", task.url)))?;
        let hkey = host_key(&host);

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::row_exists(&tx, "SELECT 1 FROM blocklist WHERE host_key = ?1", &hkey)? {
            return Err(StoreError::BlockedHost(host));
        }
        if Self::row_exists(&tx, "SELECT 1 FROM queue WHERE id = ?1", &task.id)? {
            return Err(StoreError::DuplicateTask(task.id.clone()));
        }

        tx.execute(
            "INSERT INTO queue
                 (id, action, url, url_key, host, host_key, prettify, enqueued_at, try_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                task.id,
                task.action.to_db_string(),
                task.url,
                task.url_key,
                host,
                hkey,
                task.prettify,
                now_ts(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(task = %task.id, url = %task.url, "enqueued task");
        Ok(())
    }

    fn claim_next(&mut self, worker: &str, lease: Duration) -> StoreResult<Option<TaskRecord>> {
        let now = Utc::now();
        let now_s = fmt_ts(&now);
        let lease_expiry = fmt_ts(&(now + chrono::Duration::seconds(lease.as_secs() as i64)));

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let task = tx
            .query_row(NEXT_ELIGIBLE_SQL, [&now_s], map_task_row)
            .optional()?;

        let mut task = match task {
            Some(task) => task,
            None => return Ok(None),
        };

        // A transient failure from the previous attempt is cleared so the
        // new attempt starts clean; try_count keeps the history
        tx.execute(
            "UPDATE queue
             SET claimed_by = ?1, lease_expires_at = ?2, error_code = NULL
             WHERE id = ?3",
            params![worker, lease_expiry, task.id],
        )?;
        tx.commit()?;

        task.error_code = None;
        task.claimed_by = Some(worker.to_string());
        task.lease_expires_at = Some(lease_expiry);

        tracing::debug!(task = %task.id, worker = %worker, "claimed task");
        Ok(Some(task))
    }

    fn next_eligible(&self) -> StoreResult<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(NEXT_ELIGIBLE_SQL, [&now_ts()], map_task_row)
            .optional()?;
        Ok(task)
    }

    fn get_task(&self, task_id: &str) -> StoreResult<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(TASK_BY_ID_SQL, [task_id], map_task_row)
            .optional()?;
        Ok(task)
    }

    fn record_failure(
        &mut self,
        task_id: &str,
        kind: &FailureKind,
        retry_after: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let code = kind.code();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !Self::row_exists(&tx, "SELECT 1 FROM queue WHERE id = ?1", &task_id)? {
            return Err(StoreError::UnknownTask(task_id.to_string()));
        }

        let permanent: Option<bool> = tx
            .query_row(
                "SELECT permanent FROM failure_kinds WHERE code = ?1",
                [&code],
                |row| row.get::<_, i64>(0).map(|v| v != 0),
            )
            .optional()?;
        let permanent = permanent.ok_or_else(|| StoreError::UnknownFailureKind(code.clone()))?;

        // Only a transient failure earns a retry delay; a permanent one
        // excludes the task from selection outright
        let delay_until = if permanent {
            None
        } else {
            retry_after.map(|ts| fmt_ts(&ts))
        };

        tx.execute(
            "UPDATE queue
             SET try_count = try_count + 1, error_code = ?1, delay_until = ?2,
                 claimed_by = NULL, lease_expires_at = NULL
             WHERE id = ?3",
            params![code, delay_until, task_id],
        )?;
        tx.commit()?;

        if permanent {
            tracing::warn!(task = %task_id, code = %code, "task failed permanently");
        } else {
            tracing::debug!(task = %task_id, code = %code, "task failed, will retry");
        }
        Ok(())
    }

    fn remove_task(&mut self, task_id: &str) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::remove_task_on(&tx, task_id)?;
        tx.commit()?;
        Ok(())
    }

    fn count_queued(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_transient_failures(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM queue q
             JOIN failure_kinds f ON q.error_code = f.code
             WHERE f.permanent = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_permanent_failures(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM queue q
             JOIN failure_kinds f ON q.error_code = f.code
             WHERE f.permanent = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Content Store =====

    fn find_or_create_identity(&mut self, url: &str, url_key: &str) -> StoreResult<i64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = Self::find_or_create_identity_on(&tx, url, url_key)?;
        tx.commit()?;
        Ok(id)
    }

    fn add_version(
        &mut self,
        identity_id: i64,
        version_id: &str,
        action: ActionKind,
        result: &FetchResult,
    ) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::add_version_on(&tx, identity_id, version_id, action, result)?;
        tx.commit()?;
        Ok(())
    }

    fn remove_version(&mut self, version_id: &str) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::remove_version_on(&tx, version_id)?;
        tx.commit()?;
        Ok(())
    }

    fn remove_all_versions(&mut self, identity_id: i64) -> StoreResult<Vec<ExternalLocation>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !Self::row_exists(
            &tx,
            "SELECT 1 FROM content_identities WHERE id = ?1",
            &identity_id,
        )? {
            return Err(StoreError::IdentityNotFound(identity_id));
        }

        // Externally stored payloads outlive the metadata; report their
        // locations so the storage collaborator can delete the bytes
        let mut stmt = tx.prepare(
            "SELECT id, backend, location FROM content_versions
             WHERE identity_id = ?1 AND backend != 'database' AND location IS NOT NULL",
        )?;
        let locations = stmt
            .query_map([identity_id], |row| {
                let backend_code: String = row.get(1)?;
                let backend = StorageBackend::from_db_string(&backend_code)
                    .ok_or_else(|| unknown_code_err(1, "backend", &backend_code))?;
                Ok(ExternalLocation {
                    version_id: row.get(0)?,
                    backend,
                    location: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut stmt =
            tx.prepare("SELECT id FROM content_versions WHERE identity_id = ?1")?;
        let version_ids = stmt
            .query_map([identity_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        for version_id in &version_ids {
            Self::remove_version_on(&tx, version_id)?;
        }

        // Covers the zero-version identity; otherwise the last
        // remove_version_on already deleted the row
        tx.execute(
            "DELETE FROM content_identities WHERE id = ?1",
            [identity_id],
        )?;
        tx.commit()?;

        tracing::info!(
            identity = identity_id,
            versions = version_ids.len(),
            external = locations.len(),
            "purged identity"
        );
        Ok(locations)
    }

    fn identity_by_key(&self, url_key: &str) -> StoreResult<Option<IdentityRecord>> {
        let identity = self
            .conn
            .query_row(
                "SELECT id, url, url_key, version_count FROM content_identities WHERE url_key = ?1",
                [url_key],
                |row| {
                    Ok(IdentityRecord {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        url_key: row.get(2)?,
                        version_count: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(identity)
    }

    fn versions_for_identity(&self, identity_id: i64) -> StoreResult<Vec<VersionRecord>> {
        let sql = format!(
            "{} WHERE identity_id = ?1 ORDER BY created_at ASC, id ASC",
            VERSION_COLUMNS_SQL
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let versions = stmt
            .query_map([identity_id], map_version_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn inline_payload(&self, version_id: &str) -> StoreResult<Option<Vec<u8>>> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM inline_payloads WHERE version_id = ?1",
                [version_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body)
    }

    fn count_identities(&self) -> StoreResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM content_identities", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn count_versions(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM content_versions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Commit Protocol =====

    fn commit(&mut self, task: &TaskRecord, result: &FetchResult) -> StoreResult<i64> {
        let outcome: StoreResult<i64> = (|| {
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let identity_id = Self::find_or_create_identity_on(&tx, &task.url, &task.url_key)?;
            Self::add_version_on(&tx, identity_id, &task.id, task.action, result)?;
            Self::remove_task_on(&tx, &task.id)?;
            tx.commit()?;
            Ok(identity_id)
        })();

        match outcome {
            Ok(identity_id) => {
                tracing::info!(task = %task.id, identity = identity_id, "committed fetch result");
                Ok(identity_id)
            }
            Err(err) => {
                // The task must never be lost to a failed commit: mark it
                // for retry and surface the original error
                tracing::warn!(task = %task.id, error = %err, "commit rolled back");
                if let Err(record_err) =
                    self.record_failure(&task.id, &FailureKind::TransactionFail, None)
                {
                    tracing::error!(
                        task = %task.id,
                        error = %record_err,
                        "could not record commit failure"
                    );
                }
                Err(err)
            }
        }
    }

    // ===== Labels =====

    fn create_label(&mut self, short_name: &str, description: Option<&str>) -> StoreResult<i64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = Self::label_id_get_or_create_on(&tx, short_name)?;
        if description.is_some() {
            tx.execute(
                "UPDATE labels SET description = ?1 WHERE id = ?2",
                params![description, id],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    fn labels(&self) -> StoreResult<Vec<LabelRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, short_name, description FROM labels ORDER BY short_name")?;
        let labels = stmt
            .query_map([], |row| {
                Ok(LabelRecord {
                    id: row.get(0)?,
                    short_name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn delete_label(&mut self, short_name: &str) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let label_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM labels WHERE short_name = ?1",
                [short_name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(label_id) = label_id {
            tx.execute("DELETE FROM label_to_key WHERE label_id = ?1", [label_id])?;
            tx.execute(
                "DELETE FROM label_to_version WHERE label_id = ?1",
                [label_id],
            )?;
            tx.execute("DELETE FROM labels WHERE id = ?1", [label_id])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn attach_label_to_key(&mut self, short_name: &str, url_key: &str) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let label_id = Self::label_id_get_or_create_on(&tx, short_name)?;
        tx.execute(
            "INSERT OR IGNORE INTO label_to_key (label_id, url_key, created_at)
             VALUES (?1, ?2, ?3)",
            params![label_id, url_key, now_ts()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn attach_label_to_version(&mut self, short_name: &str, version_id: &str) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !Self::row_exists(
            &tx,
            "SELECT 1 FROM content_versions WHERE id = ?1",
            &version_id,
        )? {
            return Err(StoreError::UnknownVersion(version_id.to_string()));
        }
        let label_id = Self::label_id_get_or_create_on(&tx, short_name)?;
        tx.execute(
            "INSERT OR IGNORE INTO label_to_version (label_id, version_id) VALUES (?1, ?2)",
            params![label_id, version_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn detach_label_from_key(&mut self, short_name: &str, url_key: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM label_to_key
             WHERE url_key = ?1
               AND label_id = (SELECT id FROM labels WHERE short_name = ?2)",
            params![url_key, short_name],
        )?;
        Ok(())
    }

    fn detach_label_from_version(
        &mut self,
        short_name: &str,
        version_id: &str,
    ) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM label_to_version
             WHERE version_id = ?1
               AND label_id = (SELECT id FROM labels WHERE short_name = ?2)",
            params![version_id, short_name],
        )?;
        Ok(())
    }

    fn labels_for_key(&self, url_key: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.short_name FROM labels l
             JOIN label_to_key k ON k.label_id = l.id
             WHERE k.url_key = ?1
             ORDER BY l.short_name",
        )?;
        let labels = stmt
            .query_map([url_key], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn labels_for_version(&self, version_id: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.short_name FROM labels l
             JOIN label_to_version v ON v.label_id = l.id
             WHERE v.version_id = ?1
             ORDER BY l.short_name",
        )?;
        let labels = stmt
            .query_map([version_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    fn version_ids_labeled(&self, short_name: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.version_id FROM label_to_version v
             JOIN labels l ON l.id = v.label_id
             WHERE l.short_name = ?1
             ORDER BY v.version_id",
        )?;
        let ids = stmt
            .query_map([short_name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn sweep_orphan_key_labels(&mut self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM label_to_key
             WHERE created_at < ?1
               AND url_key NOT IN (SELECT url_key FROM content_identities)
               AND url_key NOT IN (SELECT url_key FROM queue)",
            [fmt_ts(&cutoff)],
        )?;
        if removed > 0 {
            tracing::info!(removed, "swept orphaned identity-level labels");
        }
        Ok(removed as u64)
    }

    // ===== Host Politeness =====

    fn record_host_outcome(&mut self, host: &str, success: bool) -> StoreResult<()> {
        let now = now_ts();
        let (successes, problems) = if success { (1, 0) } else { (0, 1) };
        self.conn.execute(
            "INSERT INTO host_stats
                 (host_key, host, first_seen, last_seen, success_count, problem_count)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5)
             ON CONFLICT(host_key) DO UPDATE SET
                 last_seen = excluded.last_seen,
                 success_count = success_count + excluded.success_count,
                 problem_count = problem_count + excluded.problem_count",
            params![host_key(host), host.to_lowercase(), now, successes, problems],
        )?;
        Ok(())
    }

    fn host_stats(&self, host: &str) -> StoreResult<Option<HostStatsRecord>> {
        let stats = self
            .conn
            .query_row(
                "SELECT host_key, host, first_seen, last_seen, success_count, problem_count
                 FROM host_stats WHERE host_key = ?1",
                [host_key(host)],
                |row| {
                    Ok(HostStatsRecord {
                        host_key: row.get(0)?,
                        host: row.get(1)?,
                        first_seen: row.get(2)?,
                        last_seen: row.get(3)?,
                        success_count: row.get(4)?,
                        problem_count: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    // ===== Blocklist =====

    fn block_host(&mut self, host: &str, comment: Option<&str>) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO blocklist (host_key, host, comment) VALUES (?1, ?2, ?3)
             ON CONFLICT(host_key) DO UPDATE SET comment = excluded.comment",
            params![host_key(host), host.to_lowercase(), comment],
        )?;
        tracing::info!(host = %host, "blocked host");
        Ok(())
    }

    fn unblock_host(&mut self, host: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM blocklist WHERE host_key = ?1",
            [host_key(host)],
        )?;
        Ok(())
    }

    fn is_blocked(&self, host: &str) -> StoreResult<bool> {
        Ok(Self::row_exists(
            &self.conn,
            "SELECT 1 FROM blocklist WHERE host_key = ?1",
            &host_key(host),
        )?)
    }

    fn blocked_hosts(&self) -> StoreResult<Vec<BlocklistRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT host_key, host, comment FROM blocklist ORDER BY host")?;
        let hosts = stmt
            .query_map([], |row| {
                Ok(BlocklistRecord {
                    host_key: row.get(0)?,
                    host: row.get(1)?,
                    comment: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hosts)
    }
}

fn validate_result(result: &FetchResult) -> StoreResult<()> {
    if result.backend.is_inline() {
        if result.payload.is_none() {
            return Err(StoreError::InvalidResult(
                "database backend requires a payload".to_string(),
            ));
        }
    } else if result.location.as_deref().map_or(true, str::is_empty) {
        return Err(StoreError::InvalidResult(format!(
            "{} backend requires a location",
            result.backend
        )));
    }
    Ok(())
}

fn map_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    let action_code: String = row.get(1)?;
    let action = ActionKind::from_db_string(&action_code)
        .ok_or_else(|| unknown_code_err(1, "action", &action_code))?;
    Ok(TaskRecord {
        id: row.get(0)?,
        action,
        url: row.get(2)?,
        url_key: row.get(3)?,
        host: row.get(4)?,
        host_key: row.get(5)?,
        prettify: row.get(6)?,
        enqueued_at: row.get(7)?,
        error_code: row.get(8)?,
        try_count: row.get(9)?,
        delay_until: row.get(10)?,
        claimed_by: row.get(11)?,
        lease_expires_at: row.get(12)?,
    })
}

fn map_version_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRecord> {
    let backend_code: String = row.get(2)?;
    let backend = StorageBackend::from_db_string(&backend_code)
        .ok_or_else(|| unknown_code_err(2, "backend", &backend_code))?;
    let action_code: String = row.get(3)?;
    let action = ActionKind::from_db_string(&action_code)
        .ok_or_else(|| unknown_code_err(3, "action", &action_code))?;
    Ok(VersionRecord {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        backend,
        action,
        file_name: row.get(4)?,
        mime_type: row.get(5)?,
        location: row.get(6)?,
        created_at: row.get(7)?,
        size: row.get(8)?,
        hash_method: row.get(9)?,
        hash_value: row.get(10)?,
        comment: row.get(11)?,
    })
}

fn unknown_code_err(idx: usize, what: &str, code: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown {} code '{}'", what, code).into(),
    )
}
