//! Concurrency tests for task claiming
//!
//! Several workers, each with its own connection to one shared database
//! file, race to claim tasks. Every task must be handed out exactly once.

use chitin::storage::{open_store, NewTask, Store};
use chitin::taxonomy::ActionKind;
use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[test]
fn racing_workers_claim_each_task_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("race.db");

    const TASKS: usize = 3;
    const WORKERS: usize = 5;

    let mut store = open_store(&db_path).expect("open store");
    for i in 0..TASKS {
        let task = NewTask::from_url(
            format!("task-{}", i),
            &format!("https://example.com/page/{}", i),
            ActionKind::StorePageText,
            false,
        )
        .expect("build task");
        store.enqueue(&task).expect("enqueue");
    }
    drop(store);

    let (sender, receiver) = mpsc::channel::<String>();
    let mut handles = Vec::new();

    for worker in 0..WORKERS {
        let sender = sender.clone();
        let path = db_path.clone();
        handles.push(thread::spawn(move || {
            let mut store = open_store(&path).expect("open worker store");
            let name = format!("worker-{}", worker);
            loop {
                match store.claim_next(&name, Duration::from_secs(60)) {
                    Ok(Some(task)) => sender.send(task.id).expect("report claim"),
                    Ok(None) => break,
                    Err(err) => panic!("claim failed: {}", err),
                }
            }
        }));
    }
    drop(sender);

    for handle in handles {
        handle.join().expect("worker thread");
    }

    let claimed: Vec<String> = receiver.iter().collect();
    assert_eq!(
        claimed.len(),
        TASKS,
        "expected exactly {} successful claims, got {:?}",
        TASKS,
        claimed
    );

    let unique: HashSet<&String> = claimed.iter().collect();
    assert_eq!(unique.len(), TASKS, "a task was claimed twice: {:?}", claimed);
}

#[test]
fn claim_in_one_connection_is_visible_in_another() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("shared.db");

    let mut a = open_store(&db_path).expect("open a");
    let task = NewTask::from_url(
        "t1",
        "https://example.com/a",
        ActionKind::DownloadFile,
        false,
    )
    .expect("build task");
    a.enqueue(&task).expect("enqueue");

    let mut b = open_store(&db_path).expect("open b");
    let claimed = a
        .claim_next("worker-a", Duration::from_secs(60))
        .expect("claim")
        .expect("task available");
    assert_eq!(claimed.id, "t1");

    // The other connection sees the claim and finds nothing to take
    assert!(b
        .claim_next("worker-b", Duration::from_secs(60))
        .expect("claim")
        .is_none());
}
