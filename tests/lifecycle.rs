//! End-to-end lifecycle tests against a file-backed store
//!
//! These walk the same claim/commit/fail cycle an external run loop drives,
//! and check that everything the queue and content store promise survives
//! closing and reopening the database.

use chitin::storage::{open_store, FetchResult, NewTask, Store};
use chitin::taxonomy::{ActionKind, FailureKind};
use chitin::url::{normalize_url, url_key};
use chrono::Utc;
use std::time::Duration;

const LEASE: Duration = Duration::from_secs(60);

fn new_task(id: &str, url: &str) -> NewTask {
    NewTask::from_url(id, url, ActionKind::StorePageText, false).expect("build task")
}

#[test]
fn run_loop_drains_queue_down_to_permanent_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = open_store(&dir.path().join("run.db")).expect("open store");

    store
        .enqueue(&new_task("t-ok", "https://example.com/ok"))
        .expect("enqueue");
    store
        .enqueue(&new_task("t-gone", "https://example.com/gone"))
        .expect("enqueue");
    store
        .enqueue(&new_task("t-busy", "https://example.com/busy"))
        .expect("enqueue");

    // First pass: t-ok commits, t-gone 404s, t-busy 503s with an
    // already-elapsed retry delay
    let ok = store.claim_next("w", LEASE).unwrap().expect("t-ok");
    assert_eq!(ok.id, "t-ok");
    store
        .commit(&ok, &FetchResult::inline("text/html", b"fine".to_vec()))
        .expect("commit t-ok");
    store.record_host_outcome(&ok.host, true).expect("stats");

    let gone = store.claim_next("w", LEASE).unwrap().expect("t-gone");
    assert_eq!(gone.id, "t-gone");
    store
        .record_failure(&gone.id, &FailureKind::Http(404), None)
        .expect("record 404");
    store.record_host_outcome(&gone.host, false).expect("stats");

    let busy = store.claim_next("w", LEASE).unwrap().expect("t-busy");
    assert_eq!(busy.id, "t-busy");
    store
        .record_failure(
            &busy.id,
            &FailureKind::Http(503),
            Some(Utc::now() - chrono::Duration::seconds(1)),
        )
        .expect("record 503");
    store.record_host_outcome(&busy.host, false).expect("stats");

    // The run loop keeps going: one transient failure is outstanding
    assert_eq!(store.count_transient_failures().unwrap(), 1);
    assert_eq!(store.count_permanent_failures().unwrap(), 1);

    // Second pass: t-busy retries and succeeds
    let retry = store.claim_next("w", LEASE).unwrap().expect("retry");
    assert_eq!(retry.id, "t-busy");
    assert_eq!(retry.try_count, 1);
    store
        .commit(&retry, &FetchResult::inline("text/html", b"ok now".to_vec()))
        .expect("commit retry");

    // Only the permanent failure remains: the loop can stop
    assert!(store.claim_next("w", LEASE).unwrap().is_none());
    assert_eq!(store.count_transient_failures().unwrap(), 0);
    assert_eq!(store.count_permanent_failures().unwrap(), 1);
    assert_eq!(store.count_queued().unwrap(), 1);
    assert_eq!(store.count_identities().unwrap(), 2);

    let stats = store.host_stats("example.com").unwrap().expect("host stats");
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.problem_count, 2);
}

#[test]
fn state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("resume.db");
    let key;

    {
        let mut store = open_store(&db_path).expect("open store");
        let task = new_task("t1", "https://example.com/doc");
        key = task.url_key.clone();

        store.attach_label_to_key("archive", &key).expect("label");
        store.enqueue(&task).expect("enqueue");
        store
            .enqueue(&new_task("t2", "https://example.com/later"))
            .expect("enqueue");

        let claimed = store.claim_next("w", LEASE).unwrap().expect("claim");
        store
            .commit(&claimed, &FetchResult::inline("text/html", b"body".to_vec()))
            .expect("commit");

        store.block_host("bad.example", Some("seeded")).expect("block");
    }

    // A fresh process opens the same file and sees everything
    let mut store = open_store(&db_path).expect("reopen store");

    let identity = store.identity_by_key(&key).unwrap().expect("identity");
    assert_eq!(identity.version_count, 1);
    assert_eq!(store.labels_for_key(&key).unwrap(), vec!["archive"]);
    assert_eq!(
        store.inline_payload("t1").unwrap().expect("payload"),
        b"body"
    );

    assert!(store.is_blocked("bad.example").unwrap());

    // t2 is still pending and claimable, with its original id
    let next = store.claim_next("w2", LEASE).unwrap().expect("t2");
    assert_eq!(next.id, "t2");
}

#[test]
fn purging_a_url_reports_external_payloads_to_delete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = open_store(&dir.path().join("purge.db")).expect("open store");

    let task = NewTask::from_url(
        "t-pdf",
        "https://example.com/report",
        ActionKind::PageToPdf,
        false,
    )
    .expect("build task");
    store.enqueue(&task).expect("enqueue");

    let claimed = store.claim_next("w", LEASE).unwrap().expect("claim");
    let result = FetchResult::external(
        chitin::taxonomy::StorageBackend::Filesystem,
        "/srv/crawls/report.pdf",
        "application/pdf",
    );
    let identity_id = store.commit(&claimed, &result).expect("commit");

    let locations = store.remove_all_versions(identity_id).expect("purge");
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].location, "/srv/crawls/report.pdf");

    let url = normalize_url("https://example.com/report").unwrap();
    assert!(store.identity_by_key(&url_key(&url)).unwrap().is_none());
}
