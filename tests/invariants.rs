//! Property tests for the state-machine and reporting invariants named in
//! spec §8. Grounded in the pack's `proptest!` + blocking-runtime pattern
//! for driving async calls from a synchronous property body.

use cqrs_es::Aggregate;
use device_update_agent::engine::{ActiveWorkflow, AggregateState, EngineServices, WorkflowAggregate, WorkflowCommand};
use device_update_agent::policy::{build_acknowledgement, step_key};
use device_update_agent::reporting;
use device_update_agent::result::OperationResult;
use device_update_agent::twin::DesiredDocument;
use device_update_agent::workflow::{
    InstalledCriteria, StepIndex, UpdateState, UpdateType, WorkFolder, WorkflowId, WorkflowObject,
};
use proptest::prelude::*;
use std::path::PathBuf;

fn active(agg: &WorkflowAggregate) -> &ActiveWorkflow {
    match &agg.state {
        AggregateState::Active(active) => active,
        AggregateState::NoActiveWorkflow => panic!("expected Active state"),
    }
}

fn adopt(workflow_id: &str, installed_criteria: &str, step_count: usize) -> WorkflowCommand {
    WorkflowCommand::Adopt {
        workflow_id: WorkflowId::from(workflow_id),
        retry_timestamp: None,
        update_type: UpdateType::from("sim/noop:1"),
        installed_criteria: InstalledCriteria::from(installed_criteria),
        work_folder: WorkFolder::from(PathBuf::from(format!("/tmp/{workflow_id}"))),
        step_count,
    }
}

async fn drive(agg: &mut WorkflowAggregate, command: WorkflowCommand) {
    let events = agg.handle(command, &EngineServices::default()).await.unwrap();
    for event in events {
        agg.apply(event);
    }
}

/// Runs the full download/install/apply happy path, either succeeding
/// every phase or failing at exactly `fail_at` (0 = download, 1 =
/// install, 2 = apply).
async fn run_deployment(agg: &mut WorkflowAggregate, fail_at: Option<usize>) {
    drive(agg, WorkflowCommand::BeginDownload).await;
    let download_result = if fail_at == Some(0) {
        OperationResult::failure(1, "download failed")
    } else {
        OperationResult::success()
    };
    drive(
        agg,
        WorkflowCommand::DownloadCompleted { result: download_result },
    )
    .await;
    if fail_at == Some(0) {
        return;
    }

    drive(agg, WorkflowCommand::BeginInstall).await;
    let install_result = if fail_at == Some(1) {
        OperationResult::failure(2, "install failed")
    } else {
        OperationResult::success()
    };
    drive(agg, WorkflowCommand::InstallCompleted { result: install_result }).await;
    if fail_at == Some(1) {
        return;
    }

    drive(agg, WorkflowCommand::BeginApply).await;
    let apply_result = if fail_at == Some(2) {
        OperationResult::failure(3, "apply failed")
    } else {
        OperationResult::success()
    };
    drive(agg, WorkflowCommand::ApplyCompleted { result: apply_result }).await;
}

proptest! {
    /// §8 property 2: for any successful deployment, exactly one terminal
    /// `Idle` is reported with `installedUpdateId == installed_criteria`.
    #[test]
    fn successful_deployment_always_reaches_idle_with_its_own_installed_criteria(
        workflow_id in "[a-z][a-z0-9]{0,8}",
        installed_criteria in "v[0-9]{1,4}",
        step_count in 0usize..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut agg = WorkflowAggregate::default();
            drive(&mut agg, adopt(&workflow_id, &installed_criteria, step_count)).await;
            run_deployment(&mut agg, None).await;

            prop_assert_eq!(active(&agg).object.state, UpdateState::Idle);
            prop_assert_eq!(
                active(&agg).object.installed_criteria.as_str(),
                installed_criteria.as_str()
            );
            prop_assert!(active(&agg).object.result.is_success());
            Ok(())
        })?;
    }

    /// §8 property: a failure at any phase surfaces as the single root
    /// `Failed` terminal, never a partial/ambiguous state.
    #[test]
    fn a_failure_at_any_phase_reaches_failed_and_only_failed(
        workflow_id in "[a-z][a-z0-9]{0,8}",
        fail_at in 0usize..3,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut agg = WorkflowAggregate::default();
            drive(&mut agg, adopt(&workflow_id, "v1", 0)).await;
            run_deployment(&mut agg, Some(fail_at)).await;

            prop_assert_eq!(active(&agg).object.state, UpdateState::Failed);
            prop_assert!(active(&agg).object.result.is_failure());
            Ok(())
        })?;
    }

    /// §3 invariant 5: `stepResults` is always null while
    /// `DownloadStarted`/`DeploymentInProgress`, regardless of step count.
    #[test]
    fn step_results_are_always_null_on_the_two_pre_download_states(step_count in 0usize..20) {
        let workflow = WorkflowObject::new(
            WorkflowId::from("w1"),
            None,
            UpdateType::from("sim/noop:1"),
            InstalledCriteria::from("v1"),
            WorkFolder::from(PathBuf::from("/tmp/w1")),
            step_count,
        );
        for state in [UpdateState::DeploymentInProgress, UpdateState::DownloadStarted] {
            let doc = reporting::serialize(Some(&workflow), state);
            prop_assert_eq!(doc.last_install_result.step_results, None);
        }
    }

    /// §4.7: step twin keys are `step_<index>`, ASCII decimal, contiguous
    /// with the index — never any other punctuation.
    #[test]
    fn step_keys_are_ascii_decimal_and_match_their_index(index in 0usize..100_000) {
        let key = step_key(StepIndex(index));
        prop_assert_eq!(key, format!("step_{index}"));
    }

    /// §4.7 property 5: an acknowledgement never carries the raw
    /// `updateManifestSignature` or `fileUrls` content it redacts.
    #[test]
    fn acknowledgement_never_contains_the_raw_signature_or_file_urls(
        signature in "[A-Za-z0-9/+]{16,64}",
        url in "https://[a-z]{4,12}\\.example/[a-z]{4,12}\\.bin",
        version in 0u64..10_000,
    ) {
        let desired = DesiredDocument {
            action: "ApplyDeployment".to_string(),
            workflow_id: Some("w1".to_string()),
            retry_timestamp: Some("t1".to_string()),
            update_type: Some("sim/noop:1".to_string()),
            installed_criteria: Some("v1".to_string()),
            file_urls: serde_json::json!([url]),
            update_manifest_signature: Some(signature.clone()),
            steps: vec![],
        };
        let ack = build_acknowledgement(&desired, version, 200);
        let rendered = serde_json::to_string(&ack).unwrap();
        prop_assert!(!rendered.contains(&signature));
        prop_assert!(!rendered.contains(&url));
    }

    /// §8 property 6: replaying the same `(workflow_id, retry_timestamp)`
    /// after a terminal release yields the same final `installedUpdateId`.
    #[test]
    fn replaying_the_same_workflow_after_release_yields_the_same_installed_id(
        workflow_id in "[a-z][a-z0-9]{0,8}",
        installed_criteria in "v[0-9]{1,4}",
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut agg = WorkflowAggregate::default();
            drive(&mut agg, adopt(&workflow_id, &installed_criteria, 0)).await;
            run_deployment(&mut agg, None).await;
            let first_id = active(&agg).object.installed_criteria.as_str().to_string();
            drive(&mut agg, WorkflowCommand::ReleaseTerminal).await;
            prop_assert!(matches!(agg.state, AggregateState::NoActiveWorkflow));

            drive(&mut agg, adopt(&workflow_id, &installed_criteria, 0)).await;
            run_deployment(&mut agg, None).await;
            let second_id = active(&agg).object.installed_criteria.as_str().to_string();

            prop_assert_eq!(first_id, second_id);
            Ok(())
        })?;
    }
}
