//! Events produced by the [`super::WorkflowAggregate`] — the single
//! source of truth replayed into both the aggregate's own state and the
//! audit event log.

use crate::result::OperationResult;
use crate::workflow::{InstalledCriteria, RetryTimestamp, StepIndex, UpdateType, WorkFolder, WorkflowId};
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowAdopted {
        workflow_id: WorkflowId,
        retry_timestamp: Option<RetryTimestamp>,
        update_type: UpdateType,
        installed_criteria: InstalledCriteria,
        work_folder: WorkFolder,
        step_count: usize,
    },
    CancelRequested,
    CancelCompleted { result: OperationResult },
    DownloadStarted,
    DownloadSucceeded { result: OperationResult },
    DownloadFailed { result: OperationResult },
    InstallStarted,
    InstallSucceeded { result: OperationResult },
    InstallFailed { result: OperationResult },
    ApplyStarted,
    ApplySucceeded { result: OperationResult },
    ApplyFailed { result: OperationResult },
    StepResultRecorded { index: StepIndex, result: OperationResult },
    WorkflowRehydrated {
        workflow_id: WorkflowId,
        retry_timestamp: Option<RetryTimestamp>,
        update_type: UpdateType,
        installed_criteria: InstalledCriteria,
        work_folder: WorkFolder,
        step_count: usize,
    },
    ResumedAndVerified { is_installed: bool },
    WorkflowReleased,
}

impl DomainEvent for WorkflowEvent {
    fn event_type(&self) -> String {
        match self {
            Self::WorkflowAdopted { .. } => "WorkflowAdopted".to_string(),
            Self::CancelRequested => "CancelRequested".to_string(),
            Self::CancelCompleted { .. } => "CancelCompleted".to_string(),
            Self::DownloadStarted => "DownloadStarted".to_string(),
            Self::DownloadSucceeded { .. } => "DownloadSucceeded".to_string(),
            Self::DownloadFailed { .. } => "DownloadFailed".to_string(),
            Self::InstallStarted => "InstallStarted".to_string(),
            Self::InstallSucceeded { .. } => "InstallSucceeded".to_string(),
            Self::InstallFailed { .. } => "InstallFailed".to_string(),
            Self::ApplyStarted => "ApplyStarted".to_string(),
            Self::ApplySucceeded { .. } => "ApplySucceeded".to_string(),
            Self::ApplyFailed { .. } => "ApplyFailed".to_string(),
            Self::StepResultRecorded { .. } => "StepResultRecorded".to_string(),
            Self::WorkflowRehydrated { .. } => "WorkflowRehydrated".to_string(),
            Self::ResumedAndVerified { .. } => "ResumedAndVerified".to_string(),
            Self::WorkflowReleased => "WorkflowReleased".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1".to_string()
    }
}
