//! Unit tests for `WorkflowAggregate` command handling and event application.

use super::*;
use crate::result::OperationResult;
use crate::workflow::{InstalledCriteria, UpdateType, WorkFolder, WorkflowId};
use cqrs_es::Aggregate;

fn adopt_command() -> WorkflowCommand {
    WorkflowCommand::Adopt {
        workflow_id: WorkflowId::from("w1"),
        retry_timestamp: None,
        update_type: UpdateType::from("sim/noop:1"),
        installed_criteria: InstalledCriteria::from("v2"),
        work_folder: WorkFolder::from(std::path::PathBuf::from("/tmp/w1")),
        step_count: 0,
    }
}

async fn adopted_aggregate() -> WorkflowAggregate {
    let mut agg = WorkflowAggregate::default();
    let events = agg.handle(adopt_command(), &EngineServices::default()).await.unwrap();
    for event in events {
        agg.apply(event);
    }
    agg
}

fn active(agg: &WorkflowAggregate) -> &ActiveWorkflow {
    match &agg.state {
        AggregateState::Active(active) => active,
        AggregateState::NoActiveWorkflow => panic!("expected Active state"),
    }
}

#[tokio::test]
async fn adopt_on_no_active_workflow_succeeds() {
    let agg = WorkflowAggregate::default();
    let events = agg.handle(adopt_command(), &EngineServices::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WorkflowEvent::WorkflowAdopted { .. }));
}

#[tokio::test]
async fn adopt_rejected_while_a_workflow_is_active() {
    let agg = adopted_aggregate().await;
    let result = agg.handle(adopt_command(), &EngineServices::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn begin_download_after_adopt_succeeds() {
    let agg = adopted_aggregate().await;
    let events = agg
        .handle(WorkflowCommand::BeginDownload, &EngineServices::default())
        .await
        .unwrap();
    assert_eq!(events, vec![WorkflowEvent::DownloadStarted]);
}

#[tokio::test]
async fn download_completed_before_download_started_is_rejected() {
    let agg = adopted_aggregate().await;
    let result = agg
        .handle(
            WorkflowCommand::DownloadCompleted {
                result: OperationResult::success(),
            },
            &EngineServices::default(),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn happy_path_runs_through_idle_with_no_reboot() {
    let mut agg = adopted_aggregate().await;

    for (command, expect_event) in [
        (
            WorkflowCommand::BeginDownload,
            WorkflowEvent::DownloadStarted,
        ),
        (
            WorkflowCommand::DownloadCompleted {
                result: OperationResult::success(),
            },
            WorkflowEvent::DownloadSucceeded {
                result: OperationResult::success(),
            },
        ),
        (WorkflowCommand::BeginInstall, WorkflowEvent::InstallStarted),
        (
            WorkflowCommand::InstallCompleted {
                result: OperationResult::success(),
            },
            WorkflowEvent::InstallSucceeded {
                result: OperationResult::success(),
            },
        ),
        (WorkflowCommand::BeginApply, WorkflowEvent::ApplyStarted),
        (
            WorkflowCommand::ApplyCompleted {
                result: OperationResult::success(),
            },
            WorkflowEvent::ApplySucceeded {
                result: OperationResult::success(),
            },
        ),
    ] {
        let events = agg.handle(command, &EngineServices::default()).await.unwrap();
        assert_eq!(events, vec![expect_event]);
        for event in events {
            agg.apply(event);
        }
    }

    assert_eq!(active(&agg).object.state, crate::workflow::UpdateState::Idle);
}

#[tokio::test]
async fn apply_succeeded_with_reboot_required_stays_out_of_idle() {
    let mut agg = adopted_aggregate().await;
    for command in [WorkflowCommand::BeginDownload] {
        let events = agg.handle(command, &EngineServices::default()).await.unwrap();
        for event in events {
            agg.apply(event);
        }
    }
    agg.apply(WorkflowEvent::DownloadSucceeded {
        result: OperationResult::success(),
    });
    agg.apply(WorkflowEvent::InstallStarted);
    agg.apply(WorkflowEvent::InstallSucceeded {
        result: OperationResult::success(),
    });
    agg.apply(WorkflowEvent::ApplyStarted);

    let events = agg
        .handle(
            WorkflowCommand::ApplyCompleted {
                result: OperationResult::success_reboot_required(),
            },
            &EngineServices::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        events,
        vec![WorkflowEvent::ApplySucceeded {
            result: OperationResult::success_reboot_required()
        }]
    );
    agg.apply(events.into_iter().next().unwrap());
    assert_eq!(active(&agg).object.state, crate::workflow::UpdateState::ApplyStarted);
}

#[tokio::test]
async fn cancel_requires_a_prior_cancel_requested_event() {
    let mut agg = adopted_aggregate().await;
    agg.apply(WorkflowEvent::DownloadStarted);

    let events = agg
        .handle(WorkflowCommand::RequestCancel, &EngineServices::default())
        .await
        .unwrap();
    assert_eq!(events, vec![WorkflowEvent::CancelRequested]);
    agg.apply(events.into_iter().next().unwrap());
    assert!(active(&agg).cancel_requested);

    let events = agg
        .handle(
            WorkflowCommand::CancelCompleted {
                result: OperationResult::cancelled(),
            },
            &EngineServices::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        events,
        vec![WorkflowEvent::CancelCompleted {
            result: OperationResult::cancelled()
        }]
    );
}

#[tokio::test]
async fn resume_from_persistence_then_verified_installed_reaches_idle() {
    let mut agg = WorkflowAggregate::default();
    let events = agg
        .handle(
            WorkflowCommand::RehydrateFromPersistence {
                workflow_id: WorkflowId::from("w1"),
                retry_timestamp: None,
                update_type: UpdateType::from("sim/noop:1"),
                installed_criteria: InstalledCriteria::from("v2"),
                work_folder: WorkFolder::from(std::path::PathBuf::from("/tmp/w1")),
                step_count: 0,
            },
            &EngineServices::default(),
        )
        .await
        .unwrap();
    for event in events {
        agg.apply(event);
    }
    assert!(active(&agg).awaiting_verification);

    let events = agg
        .handle(
            WorkflowCommand::ResumeVerified { is_installed: true },
            &EngineServices::default(),
        )
        .await
        .unwrap();
    for event in events {
        agg.apply(event);
    }
    assert_eq!(active(&agg).object.state, crate::workflow::UpdateState::Idle);
    assert!(!active(&agg).awaiting_verification);
}
