//! Workflow Object: the parsed manifest tree the engine drives.
//!
//! Root plus ordered steps, held as a plain value (no raw pointers, no
//! arena of handles) per the Design Notes' "handle/child tree" guidance —
//! children are addressed by `StepIndex` into a `Vec`.

pub mod types;

pub use types::{InstalledCriteria, RetryTimestamp, StepIndex, UpdateType, WorkFolder, WorkflowId};

use crate::result::OperationResult;
use serde::{Deserialize, Serialize};

/// Desired action as delivered by the cloud (§3). `Download`/`Install`/
/// `Apply` are legacy spellings accepted on input and flattened to
/// `ApplyDeployment` by [`UpdateAction::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateAction {
    ApplyDeployment,
    Cancel,
    /// Legacy, pre-flattening spellings. Never produced internally.
    Download,
    Install,
    Apply,
}

impl UpdateAction {
    /// Collapses the legacy per-phase actions onto `ApplyDeployment`.
    pub fn normalize(self) -> UpdateAction {
        match self {
            UpdateAction::Download | UpdateAction::Install | UpdateAction::Apply => {
                UpdateAction::ApplyDeployment
            }
            other => other,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self.normalize() {
            UpdateAction::ApplyDeployment => 3,
            UpdateAction::Cancel => 255,
            _ => unreachable!("normalize() removes legacy variants"),
        }
    }
}

/// Reported state (§3). Numeric values match the S1 scenario's sequence
/// (`3..=8`, `0` for Idle) so reported documents are stable across
/// releases of this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateState {
    Idle,
    DeploymentInProgress,
    DownloadStarted,
    DownloadSucceeded,
    InstallStarted,
    InstallSucceeded,
    ApplyStarted,
    Failed,
}

impl UpdateState {
    pub fn as_i32(&self) -> i32 {
        match self {
            UpdateState::Idle => 0,
            UpdateState::DeploymentInProgress => 3,
            UpdateState::DownloadStarted => 4,
            UpdateState::DownloadSucceeded => 5,
            UpdateState::InstallStarted => 6,
            UpdateState::InstallSucceeded => 7,
            UpdateState::ApplyStarted => 8,
            UpdateState::Failed => 255,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::Idle | UpdateState::Failed)
    }
}

/// One child of a workflow: same result-shape as the root, addressed by
/// `StepIndex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub index: StepIndex,
    pub result: OperationResult,
}

impl Step {
    pub fn new(index: StepIndex) -> Self {
        Self {
            index,
            result: OperationResult::default(),
        }
    }

    pub fn has_run(&self) -> bool {
        !matches!(self.result.result_code, crate::result::ResultCode::Unknown(0))
    }
}

/// Root plus ordered steps: the value-typed tree the engine owns
/// exclusively for the lifetime of one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowObject {
    pub workflow_id: WorkflowId,
    pub retry_timestamp: Option<RetryTimestamp>,
    pub update_type: UpdateType,
    pub installed_criteria: InstalledCriteria,
    pub work_folder: WorkFolder,
    pub current_action: UpdateAction,
    /// Authoritative machine state; drives which commands are valid.
    pub state: UpdateState,
    /// State most recently handed to the Reporting Serializer; used to
    /// detect whether a report is still pending for the current `state`.
    pub last_reported_state: UpdateState,
    pub result: OperationResult,
    pub steps: Vec<Step>,
}

impl WorkflowObject {
    pub fn new(
        workflow_id: WorkflowId,
        retry_timestamp: Option<RetryTimestamp>,
        update_type: UpdateType,
        installed_criteria: InstalledCriteria,
        work_folder: WorkFolder,
        step_count: usize,
    ) -> Self {
        Self {
            workflow_id,
            retry_timestamp,
            update_type,
            installed_criteria,
            work_folder,
            current_action: UpdateAction::ApplyDeployment,
            state: UpdateState::DeploymentInProgress,
            last_reported_state: UpdateState::Idle,
            result: OperationResult::default(),
            steps: (0..step_count).map(|i| Step::new(StepIndex(i))).collect(),
        }
    }

    /// Invariant 3: same `workflow_id`, different (or newly set)
    /// `retry_timestamp` is a replay trigger; same pair entirely is the
    /// same logical workflow.
    pub fn identity_matches(&self, workflow_id: &WorkflowId, retry_timestamp: &Option<RetryTimestamp>) -> bool {
        &self.workflow_id == workflow_id && &self.retry_timestamp == retry_timestamp
    }

    pub fn step(&self, index: StepIndex) -> Option<&Step> {
        self.steps.get(index.0)
    }

    pub fn step_mut(&mut self, index: StepIndex) -> Option<&mut Step> {
        self.steps.get_mut(index.0)
    }

    /// Invariant 6: root result mirrors the first failing step, or the
    /// last step's result on full success. A workflow with no steps keeps
    /// its own directly-assigned result (the simulator handler reports
    /// directly on the root in that case).
    pub fn recompute_aggregate_result(&mut self) {
        if self.steps.is_empty() {
            return;
        }
        if let Some(first_failure) = self.steps.iter().find(|s| s.result.is_failure()) {
            self.result = first_failure.result.clone();
            return;
        }
        if let Some(last) = self.steps.last() {
            if last.has_run() {
                self.result = last.result.clone();
            }
        }
    }
}
