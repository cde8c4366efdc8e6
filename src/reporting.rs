//! Reporting Serializer (§4.5): builds the reported-property document
//! from the current [`WorkflowObject`] and [`UpdateState`].

use crate::workflow::{UpdateState, WorkflowObject};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkflowRef {
    pub action: i32,
    pub id: String,
    #[serde(rename = "retryTimestamp", skip_serializing_if = "Option::is_none")]
    pub retry_timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StepResultJson {
    #[serde(rename = "resultCode")]
    pub result_code: i32,
    #[serde(rename = "extendedResultCode")]
    pub extended_result_code: i32,
    #[serde(rename = "resultDetails")]
    pub result_details: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LastInstallResult {
    #[serde(rename = "resultCode")]
    pub result_code: i32,
    #[serde(rename = "extendedResultCode")]
    pub extended_result_code: i32,
    #[serde(rename = "resultDetails")]
    pub result_details: Option<String>,
    #[serde(rename = "stepResults")]
    pub step_results: Option<BTreeMap<String, StepResultJson>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportedDocument {
    pub state: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowRef>,
    #[serde(rename = "installedUpdateId", skip_serializing_if = "Option::is_none")]
    pub installed_update_id: Option<String>,
    #[serde(rename = "lastInstallResult")]
    pub last_install_result: LastInstallResult,
}

/// Builds the reported document for the current `state` against an
/// (optionally absent) active workflow. `state` is taken separately from
/// `workflow.map(|w| w.state)` so startup-idle-with-no-workflow (§3
/// invariant 4) can be expressed without a dummy `WorkflowObject`.
pub fn serialize(workflow: Option<&WorkflowObject>, state: UpdateState) -> ReportedDocument {
    // §3 invariant 5: cleared unconditionally on these two states. A
    // clearing step that could itself fail would be a defensive
    // warn-and-continue per the resolved Open Question; here the
    // transform is a pure in-memory `None`, so the failure path is
    // unreachable and intentionally not implemented as fallible.
    let force_null_step_results = matches!(
        state,
        UpdateState::DownloadStarted | UpdateState::DeploymentInProgress
    );

    let step_results = match workflow {
        Some(w) if !force_null_step_results && !w.steps.is_empty() => Some(
            w.steps
                .iter()
                .map(|step| {
                    (
                        step.index.twin_key(),
                        StepResultJson {
                            result_code: step.result.result_code.as_i32(),
                            extended_result_code: step.result.extended_result_code.0,
                            result_details: step.result.result_details.clone(),
                        },
                    )
                })
                .collect(),
        ),
        _ => None,
    };

    let last_install_result = match workflow {
        Some(w) => LastInstallResult {
            result_code: w.result.result_code.as_i32(),
            extended_result_code: w.result.extended_result_code.0,
            result_details: w.result.result_details.clone(),
            step_results,
        },
        None => LastInstallResult {
            result_code: 0,
            extended_result_code: 0,
            result_details: None,
            step_results: None,
        },
    };

    let workflow_ref = workflow.map(|w| WorkflowRef {
        action: w.current_action.as_i32(),
        id: w.workflow_id.as_str().to_string(),
        retry_timestamp: w.retry_timestamp.as_ref().map(|t| t.as_str().to_string()),
    });

    // Only a genuinely successful terminal Idle carries an installed id;
    // an Idle reported because no workflow is active at all must not.
    let installed_update_id = match workflow {
        Some(w) if state == UpdateState::Idle && w.result.is_success() => {
            Some(w.installed_criteria.as_str().to_string())
        }
        _ => None,
    };

    ReportedDocument {
        state: state.as_i32(),
        workflow: workflow_ref,
        installed_update_id,
        last_install_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::OperationResult;
    use crate::workflow::{InstalledCriteria, RetryTimestamp, StepIndex, UpdateType, WorkFolder, WorkflowId};
    use std::path::PathBuf;

    fn workflow(step_count: usize) -> WorkflowObject {
        WorkflowObject::new(
            WorkflowId::from("w1"),
            Some(RetryTimestamp::from("t1")),
            UpdateType::from("sim/noop:1"),
            InstalledCriteria::from("v2"),
            WorkFolder::from(PathBuf::from("/tmp/w1")),
            step_count,
        )
    }

    #[test]
    fn startup_with_no_workflow_omits_workflow_field() {
        let doc = serialize(None, UpdateState::Idle);
        assert_eq!(doc.workflow, None);
        assert_eq!(doc.installed_update_id, None);
        assert_eq!(doc.state, 0);
    }

    #[test]
    fn step_results_are_null_on_deployment_in_progress_even_with_steps() {
        let wf = workflow(2);
        let doc = serialize(Some(&wf), UpdateState::DeploymentInProgress);
        assert_eq!(doc.last_install_result.step_results, None);
    }

    #[test]
    fn step_results_are_null_on_download_started() {
        let wf = workflow(2);
        let doc = serialize(Some(&wf), UpdateState::DownloadStarted);
        assert_eq!(doc.last_install_result.step_results, None);
    }

    #[test]
    fn step_results_present_once_past_download_started_with_steps() {
        let mut wf = workflow(2);
        wf.step_mut(StepIndex(0)).unwrap().result = OperationResult::success();
        let doc = serialize(Some(&wf), UpdateState::InstallStarted);
        let steps = doc.last_install_result.step_results.expect("expected step results");
        assert!(steps.contains_key("step_0"));
        assert!(steps.contains_key("step_1"));
    }

    #[test]
    fn step_results_absent_when_workflow_has_no_steps() {
        let wf = workflow(0);
        let doc = serialize(Some(&wf), UpdateState::InstallStarted);
        assert_eq!(doc.last_install_result.step_results, None);
    }

    #[test]
    fn installed_update_id_set_only_on_successful_terminal_idle() {
        let mut wf = workflow(0);
        wf.result = OperationResult::success();
        let doc = serialize(Some(&wf), UpdateState::Idle);
        assert_eq!(doc.installed_update_id.as_deref(), Some("v2"));
    }

    #[test]
    fn installed_update_id_absent_on_failed_terminal() {
        let mut wf = workflow(0);
        wf.result = OperationResult::failure(1, "nope");
        let doc = serialize(Some(&wf), UpdateState::Failed);
        assert_eq!(doc.installed_update_id, None);
    }

    #[test]
    fn workflow_ref_omits_retry_timestamp_when_absent() {
        let wf = WorkflowObject::new(
            WorkflowId::from("w2"),
            None,
            UpdateType::from("sim/noop:1"),
            InstalledCriteria::from("v3"),
            WorkFolder::from(PathBuf::from("/tmp/w2")),
            0,
        );
        let doc = serialize(Some(&wf), UpdateState::DeploymentInProgress);
        let value = serde_json::to_value(&doc).unwrap();
        assert!(!value["workflow"].as_object().unwrap().contains_key("retryTimestamp"));
    }
}
