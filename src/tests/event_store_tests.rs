use super::*;
use crate::engine::{EngineServices, WorkflowCommand};
use crate::workflow::{InstalledCriteria, UpdateType, WorkFolder, WorkflowId};
use cqrs_es::CqrsFramework;
use tempfile::tempdir;

fn build_cqrs_for_test() -> (tempfile::TempDir, CqrsFramework<WorkflowAggregate, FileEventStore>) {
    let dir = tempdir().expect("temp dir");
    let store = FileEventStore {
        log_path: dir.path().join("events.jsonl"),
        snapshot_path: dir.path().join("snapshot.json"),
        snapshot_every: 50,
    };
    let queries: Vec<Box<dyn cqrs_es::Query<WorkflowAggregate>>> = Vec::new();
    (dir, CqrsFramework::new(store, queries, EngineServices::default()))
}

fn adopt_cmd() -> WorkflowCommand {
    WorkflowCommand::Adopt {
        workflow_id: WorkflowId::from("w1"),
        retry_timestamp: None,
        update_type: UpdateType::from("sim/noop:1"),
        installed_criteria: InstalledCriteria::from("v2"),
        work_folder: WorkFolder::from(std::path::PathBuf::from("/tmp/w1")),
        step_count: 0,
    }
}

#[tokio::test]
async fn adopt_via_cqrs_framework_commits_to_the_log() {
    let (_dir, cqrs) = build_cqrs_for_test();
    let result = cqrs.execute("w1", adopt_cmd()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn load_aggregate_after_commit_reflects_sequence() {
    let (dir, cqrs) = build_cqrs_for_test();
    cqrs.execute("w1", adopt_cmd()).await.unwrap();

    let store = FileEventStore {
        log_path: dir.path().join("events.jsonl"),
        snapshot_path: dir.path().join("snapshot.json"),
        snapshot_every: 50,
    };
    let ctx = store.load_aggregate("w1").await.unwrap();
    assert_eq!(ctx.current_sequence, 1);
}

#[tokio::test]
async fn events_for_different_aggregate_ids_do_not_cross_contaminate() {
    let (dir, cqrs) = build_cqrs_for_test();
    cqrs.execute("w1", adopt_cmd()).await.unwrap();

    let mut other = adopt_cmd();
    if let WorkflowCommand::Adopt { workflow_id, .. } = &mut other {
        *workflow_id = WorkflowId::from("w2");
    }
    cqrs.execute("w2", other).await.unwrap();

    let store = FileEventStore {
        log_path: dir.path().join("events.jsonl"),
        snapshot_path: dir.path().join("snapshot.json"),
        snapshot_every: 50,
    };
    let w1_events = store.load_events("w1").await.unwrap();
    let w2_events = store.load_events("w2").await.unwrap();
    assert_eq!(w1_events.len(), 1);
    assert_eq!(w2_events.len(), 1);
}

#[test]
fn should_snapshot_fires_on_multiples_and_never_when_disabled() {
    assert!(!should_snapshot(49, 50));
    assert!(should_snapshot(50, 50));
    assert!(should_snapshot(100, 50));
    assert!(!should_snapshot(101, 50));
    assert!(!should_snapshot(50, 0));
}
