//! The workflow aggregate: command validation and event application for
//! the §4.3 state machine.

use super::commands::WorkflowCommand;
use super::events::WorkflowEvent;
use crate::error::WorkflowError;
use crate::result::OperationResult;
use crate::workflow::{UpdateState, WorkflowObject};
use async_trait::async_trait;
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

/// External collaborator the aggregate needs for command handling: a
/// clock, so timestamps are injectable in tests. No other services are
/// needed — handler invocation and persistence happen in the engine
/// driver, outside the aggregate (see `engine::driver`).
#[derive(Debug, Clone, Default)]
pub struct EngineServices {
    pub clock: EngineClock,
}

#[derive(Debug, Clone, Default)]
pub struct EngineClock;

impl EngineClock {
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

/// The active workflow plus the cooperative-cancellation flag (§5); kept
/// alongside the [`WorkflowObject`] rather than inside it, since
/// cancellation is an engine concern, not part of the parsed manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveWorkflow {
    pub object: WorkflowObject,
    pub cancel_requested: bool,
    /// Set only by [`WorkflowEvent::WorkflowRehydrated`]; cleared by
    /// `ResumedAndVerified`. Distinguishes a post-reboot resume from an
    /// ordinary in-progress `ApplyStarted`.
    pub awaiting_verification: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum AggregateState {
    #[default]
    NoActiveWorkflow,
    Active(Box<ActiveWorkflow>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowAggregate {
    pub state: AggregateState,
}

fn next_phase_result_event(
    success_event: impl FnOnce(OperationResult) -> WorkflowEvent,
    failure_event: impl FnOnce(OperationResult) -> WorkflowEvent,
    result: OperationResult,
) -> WorkflowEvent {
    if result.is_success() {
        success_event(result)
    } else {
        failure_event(result)
    }
}

#[async_trait]
impl Aggregate for WorkflowAggregate {
    type Command = WorkflowCommand;
    type Event = WorkflowEvent;
    type Error = WorkflowError;
    type Services = EngineServices;

    fn aggregate_type() -> String {
        "workflow".to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        _services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        use AggregateState::*;
        use WorkflowCommand as C;

        match (&self.state, command) {
            (
                NoActiveWorkflow,
                C::Adopt {
                    workflow_id,
                    retry_timestamp,
                    update_type,
                    installed_criteria,
                    work_folder,
                    step_count,
                },
            ) => Ok(vec![WorkflowEvent::WorkflowAdopted {
                workflow_id,
                retry_timestamp,
                update_type,
                installed_criteria,
                work_folder,
                step_count,
            }]),

            (
                NoActiveWorkflow,
                C::RehydrateFromPersistence {
                    workflow_id,
                    retry_timestamp,
                    update_type,
                    installed_criteria,
                    work_folder,
                    step_count,
                },
            ) => Ok(vec![WorkflowEvent::WorkflowRehydrated {
                workflow_id,
                retry_timestamp,
                update_type,
                installed_criteria,
                work_folder,
                step_count,
            }]),

            (Active(active), C::ResumeVerified { is_installed }) if active.awaiting_verification => {
                Ok(vec![WorkflowEvent::ResumedAndVerified { is_installed }])
            }

            (Active(active), C::BeginDownload) if active.object.state == UpdateState::DeploymentInProgress => {
                Ok(vec![WorkflowEvent::DownloadStarted])
            }

            (Active(active), C::DownloadCompleted { result })
                if active.object.state == UpdateState::DownloadStarted =>
            {
                Ok(vec![next_phase_result_event(
                    WorkflowEvent::DownloadSucceeded,
                    WorkflowEvent::DownloadFailed,
                    result,
                )])
            }

            (Active(active), C::BeginInstall) if active.object.state == UpdateState::DownloadSucceeded => {
                Ok(vec![WorkflowEvent::InstallStarted])
            }

            (Active(active), C::InstallCompleted { result })
                if active.object.state == UpdateState::InstallStarted =>
            {
                Ok(vec![next_phase_result_event(
                    WorkflowEvent::InstallSucceeded,
                    WorkflowEvent::InstallFailed,
                    result,
                )])
            }

            (Active(active), C::BeginApply) if active.object.state == UpdateState::InstallSucceeded => {
                Ok(vec![WorkflowEvent::ApplyStarted])
            }

            (Active(active), C::ApplyCompleted { result })
                if active.object.state == UpdateState::ApplyStarted =>
            {
                Ok(vec![next_phase_result_event(
                    WorkflowEvent::ApplySucceeded,
                    WorkflowEvent::ApplyFailed,
                    result,
                )])
            }

            (Active(active), C::StepCompleted { index, result }) if !active.object.state.is_terminal() => {
                Ok(vec![WorkflowEvent::StepResultRecorded { index, result }])
            }

            // A Cancel may arrive at any non-terminal point, including
            // before any phase has begun (§4.3: "Any non-terminal").
            (Active(active), C::RequestCancel) if !active.object.state.is_terminal() => {
                Ok(vec![WorkflowEvent::CancelRequested])
            }

            (Active(active), C::CancelCompleted { result }) if active.cancel_requested => {
                Ok(vec![WorkflowEvent::CancelCompleted { result }])
            }

            (Active(active), C::ReleaseTerminal) if active.object.state.is_terminal() => {
                Ok(vec![WorkflowEvent::WorkflowReleased])
            }

            (state, command) => Err(WorkflowError::InvalidStateTransition {
                state: format!("{state:?}"),
                command: format!("{command:?}"),
            }),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        use WorkflowEvent as E;

        match (&mut self.state, event) {
            (
                AggregateState::NoActiveWorkflow,
                E::WorkflowAdopted {
                    workflow_id,
                    retry_timestamp,
                    update_type,
                    installed_criteria,
                    work_folder,
                    step_count,
                },
            ) => {
                self.state = AggregateState::Active(Box::new(ActiveWorkflow {
                    object: WorkflowObject::new(
                        workflow_id,
                        retry_timestamp,
                        update_type,
                        installed_criteria,
                        work_folder,
                        step_count,
                    ),
                    cancel_requested: false,
                    awaiting_verification: false,
                }));
            }

            (
                AggregateState::NoActiveWorkflow,
                E::WorkflowRehydrated {
                    workflow_id,
                    retry_timestamp,
                    update_type,
                    installed_criteria,
                    work_folder,
                    step_count,
                },
            ) => {
                let mut object = WorkflowObject::new(
                    workflow_id,
                    retry_timestamp,
                    update_type,
                    installed_criteria,
                    work_folder,
                    step_count,
                );
                object.state = UpdateState::ApplyStarted;
                self.state = AggregateState::Active(Box::new(ActiveWorkflow {
                    object,
                    cancel_requested: false,
                    awaiting_verification: true,
                }));
            }

            (AggregateState::Active(active), E::ResumedAndVerified { is_installed }) => {
                active.awaiting_verification = false;
                if is_installed {
                    active.object.state = UpdateState::Idle;
                    active.object.result = OperationResult::success();
                } else {
                    active.object.state = UpdateState::Failed;
                    active.object.result =
                        OperationResult::failure(9001, "post-reboot verification: IsInstalled returned false");
                }
            }

            (AggregateState::Active(active), E::DownloadStarted) => {
                active.object.state = UpdateState::DownloadStarted;
            }
            (AggregateState::Active(active), E::DownloadSucceeded { result }) => {
                active.object.state = UpdateState::DownloadSucceeded;
                active.object.result = result;
            }
            (AggregateState::Active(active), E::DownloadFailed { result }) => {
                active.object.state = UpdateState::Failed;
                active.object.result = result;
            }

            (AggregateState::Active(active), E::InstallStarted) => {
                active.object.state = UpdateState::InstallStarted;
            }
            (AggregateState::Active(active), E::InstallSucceeded { result }) => {
                active.object.state = UpdateState::InstallSucceeded;
                active.object.result = result;
            }
            (AggregateState::Active(active), E::InstallFailed { result }) => {
                active.object.state = UpdateState::Failed;
                active.object.result = result;
            }

            (AggregateState::Active(active), E::ApplyStarted) => {
                active.object.state = UpdateState::ApplyStarted;
            }
            (AggregateState::Active(active), E::ApplySucceeded { result }) => {
                // A reboot/agent-restart requirement does not change the
                // reported top state; the driver persists and invokes the
                // capability, then the next boot's `ResumedAndVerified`
                // carries the workflow to `Idle`. A plain success with no
                // reboot requirement goes straight to `Idle`.
                if result.requests_reboot() || result.requests_agent_restart() {
                    active.object.result = result;
                } else {
                    active.object.state = UpdateState::Idle;
                    active.object.result = result;
                }
            }
            (AggregateState::Active(active), E::ApplyFailed { result }) => {
                active.object.state = UpdateState::Failed;
                active.object.result = result;
            }

            (AggregateState::Active(active), E::StepResultRecorded { index, result }) => {
                if let Some(step) = active.object.step_mut(index) {
                    step.result = result;
                }
                active.object.recompute_aggregate_result();
            }

            (AggregateState::Active(active), E::CancelRequested) => {
                active.cancel_requested = true;
            }
            (AggregateState::Active(active), E::CancelCompleted { result }) => {
                active.object.state = UpdateState::Failed;
                active.object.result = result;
            }

            (AggregateState::Active(_), E::WorkflowReleased) => {
                self.state = AggregateState::NoActiveWorkflow;
            }

            (state, event) => {
                tracing::warn!(?state, ?event, "event applied in an unexpected aggregate state");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/aggregate_tests.rs"]
mod tests;
