//! Reference content handler for update type `"sim/noop:1"`.
//!
//! This is the one handler the spec's own end-to-end scenarios (S1-S6)
//! assume exists. It does no real network or package work; it marks
//! progress with a small file under `work_folder` so that
//! `is_installed()` answers correctly even across a simulated reboot
//! (a fresh process reusing the same `work_folder`).

use super::ContentHandler;
use crate::result::OperationResult;
use crate::workflow::{StepIndex, WorkflowObject};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Scripted outcome for one phase, settable by tests to exercise every
/// §4.3 edge without a real handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SimulatorBehavior {
    #[default]
    Succeed,
    SucceedWithReboot,
    SucceedWithAgentRestart,
    FailDownload { extended_code: i32, details: String },
    FailInstall { extended_code: i32, details: String },
    FailApply { extended_code: i32, details: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    installed_criteria: String,
}

const MARKER_FILE_NAME: &str = "simulator_state.json";

pub struct SimulatorHandler {
    behavior: SimulatorBehavior,
    /// Records step-level outcomes for multi-step deployments (§8 S6).
    /// `None` means "every step succeeds".
    step_script: Mutex<Option<Vec<OperationResult>>>,
}

impl SimulatorHandler {
    pub fn new(behavior: SimulatorBehavior) -> Self {
        Self {
            behavior,
            step_script: Mutex::new(None),
        }
    }

    pub fn with_step_script(behavior: SimulatorBehavior, step_script: Vec<OperationResult>) -> Self {
        Self {
            behavior,
            step_script: Mutex::new(Some(step_script)),
        }
    }

    /// The scripted per-step results, if any were configured.
    pub fn step_script(&self) -> Option<Vec<OperationResult>> {
        self.step_script.lock().expect("step_script mutex poisoned").clone()
    }

    fn marker_path(workflow: &WorkflowObject) -> std::path::PathBuf {
        workflow.work_folder.as_path().join(MARKER_FILE_NAME)
    }
}

impl Default for SimulatorHandler {
    fn default() -> Self {
        Self::new(SimulatorBehavior::Succeed)
    }
}

#[async_trait]
impl ContentHandler for SimulatorHandler {
    async fn download(&self, workflow: &WorkflowObject, step: Option<StepIndex>) -> OperationResult {
        if std::fs::create_dir_all(workflow.work_folder.as_path()).is_err() {
            return OperationResult::failure(1001, "failed to create work_folder");
        }
        if let Some(step) = step {
            if let Some(scripted) = self.step_script() {
                return scripted
                    .get(step.0)
                    .cloned()
                    .unwrap_or_else(|| OperationResult::failure(1003, "step index beyond scripted results"));
            }
        }
        match &self.behavior {
            SimulatorBehavior::FailDownload { extended_code, details } => {
                OperationResult::failure(*extended_code, details.clone())
            }
            _ => OperationResult::success(),
        }
    }

    async fn install(&self, _workflow: &WorkflowObject) -> OperationResult {
        match &self.behavior {
            SimulatorBehavior::FailInstall { extended_code, details } => {
                OperationResult::failure(*extended_code, details.clone())
            }
            _ => OperationResult::success(),
        }
    }

    async fn apply(&self, workflow: &WorkflowObject) -> OperationResult {
        match &self.behavior {
            SimulatorBehavior::FailApply { extended_code, details } => {
                OperationResult::failure(*extended_code, details.clone())
            }
            behavior @ (SimulatorBehavior::Succeed
            | SimulatorBehavior::SucceedWithReboot
            | SimulatorBehavior::SucceedWithAgentRestart) => {
                let marker = MarkerFile {
                    installed_criteria: workflow.installed_criteria.as_str().to_string(),
                };
                let path = Self::marker_path(workflow);
                let write_result = serde_json::to_vec(&marker)
                    .map_err(std::io::Error::other)
                    .and_then(|bytes| std::fs::write(&path, bytes));
                if write_result.is_err() {
                    return OperationResult::failure(1002, "failed to write simulator marker");
                }
                match behavior {
                    SimulatorBehavior::SucceedWithReboot => OperationResult::success_reboot_required(),
                    SimulatorBehavior::SucceedWithAgentRestart => {
                        OperationResult::success_restart_agent_required()
                    }
                    _ => OperationResult::success(),
                }
            }
            // FailDownload/FailInstall only apply to their own phase; a
            // handler reaching Apply despite one configured has nothing
            // left to fail on, so it succeeds like the default behavior.
            SimulatorBehavior::FailDownload { .. } | SimulatorBehavior::FailInstall { .. } => {
                OperationResult::success()
            }
        }
    }

    async fn cancel(&self, _workflow: &WorkflowObject) -> OperationResult {
        OperationResult::cancelled()
    }

    async fn is_installed(&self, workflow: &WorkflowObject) -> bool {
        let Ok(bytes) = std::fs::read(Self::marker_path(workflow)) else {
            return false;
        };
        let Ok(marker) = serde_json::from_slice::<MarkerFile>(&bytes) else {
            return false;
        };
        marker.installed_criteria == workflow.installed_criteria.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{InstalledCriteria, UpdateType, WorkFolder, WorkflowId};
    use tempfile::tempdir;

    fn workflow(dir: &std::path::Path) -> WorkflowObject {
        WorkflowObject::new(
            WorkflowId::from("w1"),
            Some(crate::workflow::RetryTimestamp::from("t1")),
            UpdateType::from("sim/noop:1"),
            InstalledCriteria::from("v2"),
            WorkFolder::from(dir.to_path_buf()),
            0,
        )
    }

    #[tokio::test]
    async fn happy_path_runs_through_every_phase_and_installs() {
        let dir = tempdir().unwrap();
        let handler = SimulatorHandler::default();
        let wf = workflow(dir.path());

        assert!(handler.download(&wf, None).await.is_success());
        assert!(handler.install(&wf).await.is_success());
        let apply_result = handler.apply(&wf).await;
        assert!(apply_result.is_success());
        assert!(!apply_result.requests_reboot());
        assert!(handler.is_installed(&wf).await);
    }

    #[tokio::test]
    async fn reboot_required_marker_survives_a_fresh_handler_instance() {
        let dir = tempdir().unwrap();
        let wf = workflow(dir.path());

        let handler = SimulatorHandler::new(SimulatorBehavior::SucceedWithReboot);
        handler.download(&wf, None).await;
        handler.install(&wf).await;
        let result = handler.apply(&wf).await;
        assert!(result.requests_reboot());

        // Simulated reboot: a brand new handler instance over the same
        // work_folder must still see the marker.
        let fresh_handler = SimulatorHandler::default();
        assert!(fresh_handler.is_installed(&wf).await);
    }

    #[tokio::test]
    async fn is_installed_false_when_no_marker_exists() {
        let dir = tempdir().unwrap();
        let wf = workflow(dir.path());
        let handler = SimulatorHandler::default();
        assert!(!handler.is_installed(&wf).await);
    }

    #[tokio::test]
    async fn failure_behavior_propagates_the_configured_extended_code() {
        let dir = tempdir().unwrap();
        let wf = workflow(dir.path());
        let handler = SimulatorHandler::new(SimulatorBehavior::FailInstall {
            extended_code: 42,
            details: "boom".to_string(),
        });
        handler.download(&wf, None).await;
        let result = handler.install(&wf).await;
        assert!(result.is_failure());
        assert_eq!(result.extended_result_code.0, 42);
    }

    #[tokio::test]
    async fn step_script_returns_the_scripted_result_for_each_index() {
        let dir = tempdir().unwrap();
        let wf = workflow(dir.path());
        let handler = SimulatorHandler::with_step_script(
            SimulatorBehavior::Succeed,
            vec![
                OperationResult::success(),
                OperationResult::failure(7, "step 1 failed"),
            ],
        );

        let step_0 = handler.download(&wf, Some(StepIndex(0))).await;
        assert!(step_0.is_success());
        let step_1 = handler.download(&wf, Some(StepIndex(1))).await;
        assert!(step_1.is_failure());
        assert_eq!(step_1.extended_result_code.0, 7);
    }

    #[tokio::test]
    async fn step_script_out_of_range_index_fails_rather_than_panicking() {
        let dir = tempdir().unwrap();
        let wf = workflow(dir.path());
        let handler = SimulatorHandler::with_step_script(SimulatorBehavior::Succeed, vec![OperationResult::success()]);

        let result = handler.download(&wf, Some(StepIndex(5))).await;
        assert!(result.is_failure());
    }
}
