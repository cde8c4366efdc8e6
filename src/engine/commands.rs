//! Commands accepted by the [`super::WorkflowAggregate`].
//!
//! `Adopt`/`Cancel` originate from [`crate::twin::DesiredDocument`] via
//! action resolution (§4.2). The `Begin*` commands are issued internally
//! by the engine driver immediately after the preceding event is applied
//! (the `begin` edges in §4.3 have no external trigger). The `*Completed`
//! commands carry a content handler's result back into the aggregate.

use crate::result::OperationResult;
use crate::workflow::{InstalledCriteria, RetryTimestamp, StepIndex, UpdateType, WorkFolder, WorkflowId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowCommand {
    /// Adopt a new (or replayed) deployment. Valid from `Idle`, or from a
    /// terminal `Failed` (starting fresh over the previous one).
    Adopt {
        workflow_id: WorkflowId,
        retry_timestamp: Option<RetryTimestamp>,
        update_type: UpdateType,
        installed_criteria: InstalledCriteria,
        work_folder: WorkFolder,
        step_count: usize,
    },
    /// Cancel requested for the currently active workflow.
    RequestCancel,
    /// The engine has dispatched the handler's `cancel()` and it returned.
    CancelCompleted { result: OperationResult },
    BeginDownload,
    DownloadCompleted {
        result: OperationResult,
    },
    BeginInstall,
    InstallCompleted {
        result: OperationResult,
    },
    BeginApply,
    ApplyCompleted {
        result: OperationResult,
    },
    /// A step-scoped result, applied before the corresponding phase's
    /// aggregate-level `*Completed` command (§3 invariant 6).
    StepCompleted {
        index: StepIndex,
        result: OperationResult,
    },
    /// A persisted record was found on startup; rehydrate the workflow in
    /// the `ApplyStarted` state, awaiting post-reboot verification.
    RehydrateFromPersistence {
        workflow_id: WorkflowId,
        retry_timestamp: Option<RetryTimestamp>,
        update_type: UpdateType,
        installed_criteria: InstalledCriteria,
        work_folder: WorkFolder,
        step_count: usize,
    },
    /// Crash-recovery resume: the handler's `IsInstalled` has answered for
    /// a rehydrated workflow.
    ResumeVerified { is_installed: bool },
    /// The terminal state has been reported to the twin; release the
    /// workflow and return to logical `Idle`.
    ReleaseTerminal,
}
