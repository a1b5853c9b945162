use chrono::Utc;
use deskrun_store::{
    AuditEntry, AuditLog, AuditStore, CrashDump, FileAuditStore, MemoryAuditStore, RunOutcome,
};
use serde_json::json;
use uuid::Uuid;

fn entries(n: usize) -> Vec<AuditEntry> {
    (0..n)
        .map(|i| AuditEntry {
            offset_ms: i as u64 * 10,
            event: "step.started".to_string(),
            payload: json!({ "seq": i }),
        })
        .collect()
}

fn log(task_id: &str, outcome: RunOutcome) -> AuditLog {
    AuditLog {
        task_id: task_id.to_string(),
        task_name: "demo".to_string(),
        run_id: Uuid::new_v4(),
        outcome,
        started_at: Utc::now(),
        saved_at: Utc::now(),
        events: entries(3),
    }
}

fn dump(task_id: &str) -> CrashDump {
    let full = entries(12);
    CrashDump {
        task_id: task_id.to_string(),
        task_name: "demo".to_string(),
        run_id: Uuid::new_v4(),
        crashed_at: Utc::now(),
        error: "timeout: all retries exhausted".to_string(),
        context: json!({ "mode": "live" }),
        event_count: full.len(),
        last_events: full[2..].to_vec(),
        full_log: full,
    }
}

#[tokio::test]
async fn file_store_round_trips_logs_and_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileAuditStore::new(dir.path().join("audit"));

    let location = store.save_log(&log("demo_1", RunOutcome::Ok)).await.unwrap();
    assert!(location.ends_with("demo_1_ok.json"));
    assert!(std::path::Path::new(&location).exists());

    let loaded = store.load_log("demo_1").await.unwrap().unwrap();
    assert_eq!(loaded.events.len(), 3);
    assert_eq!(loaded.outcome, RunOutcome::Ok);

    let location = store.save_crash_dump(&dump("demo_2")).await.unwrap();
    assert!(location.ends_with("CRASH_demo_2.json"));
    assert_eq!(store.list_crash_dumps().await.unwrap(), vec!["demo_2".to_string()]);

    let loaded = store.load_crash_dump("demo_2").await.unwrap().unwrap();
    assert_eq!(loaded.last_events.len(), 10);
    assert_eq!(loaded.event_count, 12);
    assert!(store.load_crash_dump("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn file_store_sanitizes_ids_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileAuditStore::new(dir.path());
    store
        .save_log(&log("open firefox/now", RunOutcome::Fail))
        .await
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["open_firefox_now_fail.json".to_string()]);
}

#[tokio::test]
async fn listing_a_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileAuditStore::new(dir.path().join("never-created"));
    assert!(store.list_crash_dumps().await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_store_keeps_latest_dump_per_task() {
    let store = MemoryAuditStore::new();
    store.save_crash_dump(&dump("a")).await.unwrap();
    store.save_crash_dump(&dump("b")).await.unwrap();
    store.save_crash_dump(&dump("a")).await.unwrap();

    assert_eq!(
        store.list_crash_dumps().await.unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    store.save_log(&log("a", RunOutcome::Fail)).await.unwrap();
    assert_eq!(store.logs().await.len(), 1);
}
