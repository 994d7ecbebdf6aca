//! Database schema definitions and reference-data seeding
//!
//! All SQL DDL lives here, together with the idempotent seeding of the
//! action, failure-kind, and storage-backend reference tables.
//!
//! Reference counting is maintained in application logic inside the same
//! transaction as the row changes; the schema carries no triggers and no
//! ON DELETE CASCADE clauses.

use crate::taxonomy::{ActionKind, StorageBackend, DEFAULT_FAILURE_TAXONOMY};
use rusqlite::params;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Supported crawl actions (reference data)
CREATE TABLE IF NOT EXISTS actions (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL
);

-- Failure taxonomy with permanence classification (reference data)
CREATE TABLE IF NOT EXISTS failure_kinds (
    code TEXT PRIMARY KEY,
    permanent INTEGER NOT NULL,
    description TEXT NOT NULL
);

-- Payload storage backends (reference data)
CREATE TABLE IF NOT EXISTS storage_backends (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL
);

-- Pending crawl tasks
CREATE TABLE IF NOT EXISTS queue (
    id TEXT PRIMARY KEY,
    action TEXT NOT NULL REFERENCES actions(code),
    url TEXT NOT NULL,
    url_key TEXT NOT NULL,
    host TEXT NOT NULL,
    host_key TEXT NOT NULL,
    prettify INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL,
    error_code TEXT REFERENCES failure_kinds(code),
    try_count INTEGER NOT NULL DEFAULT 0,
    delay_until TEXT,
    claimed_by TEXT,
    lease_expires_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_enqueued ON queue(enqueued_at);
CREATE INDEX IF NOT EXISTS idx_queue_url_key ON queue(url_key);
CREATE INDEX IF NOT EXISTS idx_queue_host_key ON queue(host_key);

-- One row per crawled URL, shared by all of its fetched versions
CREATE TABLE IF NOT EXISTS content_identities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    url_key TEXT NOT NULL UNIQUE,
    version_count INTEGER NOT NULL DEFAULT 0
);

-- One row per successful fetch; the id carries over the originating task id
CREATE TABLE IF NOT EXISTS content_versions (
    id TEXT PRIMARY KEY,
    identity_id INTEGER NOT NULL REFERENCES content_identities(id),
    backend TEXT NOT NULL REFERENCES storage_backends(code),
    action TEXT NOT NULL REFERENCES actions(code),
    file_name TEXT,
    mime_type TEXT,
    location TEXT,
    created_at TEXT NOT NULL,
    size INTEGER,
    hash_method TEXT,
    hash_value TEXT,
    comment TEXT
);

CREATE INDEX IF NOT EXISTS idx_versions_identity ON content_versions(identity_id);

-- Payload bodies for versions stored in the database backend
CREATE TABLE IF NOT EXISTS inline_payloads (
    version_id TEXT PRIMARY KEY REFERENCES content_versions(id),
    body BLOB NOT NULL
);

-- Operator-defined tags
CREATE TABLE IF NOT EXISTS labels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    short_name TEXT NOT NULL UNIQUE,
    description TEXT
);

-- Identity-level tags, keyed by URL key so they can be attached before the
-- identity exists and survive task removal
CREATE TABLE IF NOT EXISTS label_to_key (
    label_id INTEGER NOT NULL REFERENCES labels(id),
    url_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(label_id, url_key)
);

CREATE INDEX IF NOT EXISTS idx_label_to_key_key ON label_to_key(url_key);

-- Version-level tags
CREATE TABLE IF NOT EXISTS label_to_version (
    label_id INTEGER NOT NULL REFERENCES labels(id),
    version_id TEXT NOT NULL REFERENCES content_versions(id),
    UNIQUE(label_id, version_id)
);

-- Per-host fetch outcome counters
CREATE TABLE IF NOT EXISTS host_stats (
    host_key TEXT PRIMARY KEY,
    host TEXT NOT NULL,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    problem_count INTEGER NOT NULL DEFAULT 0
);

-- Hosts that must never be fetched
CREATE TABLE IF NOT EXISTS blocklist (
    host_key TEXT PRIMARY KEY,
    host TEXT NOT NULL,
    comment TEXT
);
"#;

/// Initializes the database schema and seeds the reference tables
///
/// Safe to call on every open: the DDL uses IF NOT EXISTS and the seeding
/// skips rows that are already present.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    seed_reference_data(conn)
}

/// Seeds the action, failure-kind, and backend reference tables
fn seed_reference_data(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    for action in ActionKind::all() {
        conn.execute(
            "INSERT OR IGNORE INTO actions (code, description) VALUES (?1, ?2)",
            params![action.to_db_string(), action.description()],
        )?;
    }

    for backend in StorageBackend::all() {
        conn.execute(
            "INSERT OR IGNORE INTO storage_backends (code, description) VALUES (?1, ?2)",
            params![backend.to_db_string(), backend.description()],
        )?;
    }

    for def in DEFAULT_FAILURE_TAXONOMY {
        conn.execute(
            "INSERT OR IGNORE INTO failure_kinds (code, permanent, description)
             VALUES (?1, ?2, ?3)",
            params![def.code, def.permanent as i64, def.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());

        // Seeding twice must not duplicate reference rows
        let actions: i64 = conn
            .query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(actions as usize, ActionKind::all().len());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "actions",
            "failure_kinds",
            "storage_backends",
            "queue",
            "content_identities",
            "content_versions",
            "inline_payloads",
            "labels",
            "label_to_key",
            "label_to_version",
            "host_stats",
            "blocklist",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_failure_taxonomy_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let permanent: i64 = conn
            .query_row(
                "SELECT permanent FROM failure_kinds WHERE code = 'http_404'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(permanent, 1);

        let transient: i64 = conn
            .query_row(
                "SELECT permanent FROM failure_kinds WHERE code = 'http_503'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(transient, 0);

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM failure_kinds", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total as usize, DEFAULT_FAILURE_TAXONOMY.len());
    }
}
