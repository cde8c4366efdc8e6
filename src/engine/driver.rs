//! The engine driver: owns the single per-device [`WorkflowAggregate`]
//! and implements §4.1's four exposed operations plus §4.2's action
//! resolution. Grounded in the teacher's `domain/actor.rs` — minus the
//! `ractor` actor wrapper, since §5 already mandates a single
//! cooperative task and no message-passing boundary is needed here.

use super::aggregate::{AggregateState, EngineServices, WorkflowAggregate};
use super::commands::WorkflowCommand;
use crate::capabilities::Capabilities;
use crate::config::AgentConfig;
use crate::error::WorkflowError;
use crate::event_store::FileEventStore;
use crate::handler::{ContentHandler, HandlerRegistry};
use crate::logging::AuditLog;
use crate::persistence::{PersistenceStore, ResumeRecord};
use crate::policy;
use crate::reporting;
use crate::result::OperationResult;
use crate::twin::{DesiredDocument, TwinChannel};
use crate::workflow::{InstalledCriteria, RetryTimestamp, UpdateState, UpdateType, WorkFolder, WorkflowId};
use cqrs_es::{AggregateError, CqrsFramework, EventStore};
use std::path::PathBuf;
use std::sync::Arc;

/// A single device runs exactly one workflow aggregate (§3 invariant 1);
/// the aggregate id is therefore constant rather than per-deployment.
const AGGREGATE_ID: &str = "workflow";

pub struct WorkflowEngine {
    cqrs: CqrsFramework<WorkflowAggregate, FileEventStore>,
    event_store: FileEventStore,
    persistence: PersistenceStore,
    registry: HandlerRegistry,
    capabilities: Capabilities,
    twin: Arc<dyn TwinChannel>,
    config: AgentConfig,
    audit: Option<Arc<AuditLog>>,
}

impl WorkflowEngine {
    pub fn new(
        config: AgentConfig,
        registry: HandlerRegistry,
        capabilities: Capabilities,
        twin: Arc<dyn TwinChannel>,
        audit: Option<Arc<AuditLog>>,
    ) -> Self {
        let event_store = FileEventStore::new(
            config.paths.event_log.clone(),
            config.paths.event_snapshot.clone(),
            50,
        );
        let persistence = PersistenceStore::new(config.paths.resume_record.clone());
        let cqrs = CqrsFramework::new(event_store.clone(), vec![], EngineServices::default());

        Self {
            cqrs,
            event_store,
            persistence,
            registry,
            capabilities,
            twin,
            config,
            audit,
        }
    }

    async fn current_aggregate(&self) -> Result<WorkflowAggregate, WorkflowError> {
        self.event_store
            .load_aggregate(AGGREGATE_ID)
            .await
            .map(|ctx| ctx.aggregate)
            .map_err(map_aggregate_error)
    }

    async fn execute(&self, command: WorkflowCommand) -> Result<(), WorkflowError> {
        if let Some(audit) = &self.audit {
            audit.log_command(&command);
        }
        self.cqrs
            .execute(AGGREGATE_ID, command)
            .await
            .map_err(map_aggregate_error)
    }

    fn work_folder_for(&self, workflow_id: &WorkflowId) -> WorkFolder {
        WorkFolder::from(PathBuf::from(format!("/var/lib/device-update-agent/work/{}", workflow_id.as_str())))
    }

    /// §4.1 `on_connected`: load any persisted resume record, verify it,
    /// and always emit a startup report.
    pub async fn on_connected(&self) -> Result<serde_json::Value, WorkflowError> {
        let aggregate = self.current_aggregate().await?;

        if matches!(aggregate.state, AggregateState::NoActiveWorkflow) {
            if let Some(record) = self
                .persistence
                .load()
                .map_err(|e| WorkflowError::PersistenceCorrupt(e.to_string()))?
            {
                self.resume_from_persistence(record).await?;
            }
        }

        let aggregate = self.current_aggregate().await?;
        // §9: "report success with installedUpdateId ... and delete the
        // persisted record" — in that order, so the report is built
        // against the still-attached workflow before `finalize_if_terminal`
        // releases it.
        let report = self.send_startup_report(&aggregate).await?;
        self.finalize_if_terminal().await?;
        Ok(report)
    }

    async fn resume_from_persistence(&self, record: ResumeRecord) -> Result<(), WorkflowError> {
        self.execute(WorkflowCommand::RehydrateFromPersistence {
            workflow_id: record.workflow_id.clone(),
            retry_timestamp: record.retry_timestamp.clone(),
            update_type: record.update_type.clone(),
            installed_criteria: record.installed_criteria.clone(),
            work_folder: record.work_folder.clone(),
            step_count: 0,
        })
        .await?;

        let aggregate = self.current_aggregate().await?;
        let AggregateState::Active(active) = &aggregate.state else {
            return Ok(());
        };

        let handler = self.registry.lookup(record.update_type.as_str())?;
        let is_installed = handler.is_installed(&active.object).await;
        self.execute(WorkflowCommand::ResumeVerified { is_installed }).await
    }

    async fn send_startup_report(&self, aggregate: &WorkflowAggregate) -> Result<serde_json::Value, WorkflowError> {
        let mut doc = serde_json::to_value(self.report_for(aggregate)).expect("ReportedDocument always serializes");

        if let serde_json::Value::Object(map) = &mut doc {
            map.insert(
                "deviceProperties".to_string(),
                serde_json::json!({
                    "manufacturer": self.config.device.manufacturer,
                    "model": self.config.device.model,
                    "interfaceId": self.config.device.interface_id,
                    "versions": if self.config.telemetry_versions { self.config.device.versions.clone() } else { Default::default() },
                }),
            );
            map.insert(
                "compatPropertyNames".to_string(),
                serde_json::Value::String(self.config.compat_property_names.as_str().to_string()),
            );
        }

        self.publish(doc).await
    }

    fn report_for(&self, aggregate: &WorkflowAggregate) -> reporting::ReportedDocument {
        match &aggregate.state {
            AggregateState::NoActiveWorkflow => reporting::serialize(None, UpdateState::Idle),
            AggregateState::Active(active) => reporting::serialize(Some(&active.object), active.object.state),
        }
    }

    async fn publish(&self, payload: serde_json::Value) -> Result<serde_json::Value, WorkflowError> {
        let status = self
            .twin
            .send_reported(payload.clone())
            .await
            .map_err(|e| WorkflowError::StorageFailure { message: e.to_string() })?;
        if let Some(audit) = &self.audit {
            audit.log_report_sent(status);
        }
        Ok(payload)
    }

    async fn send_progress_report(&self) -> Result<serde_json::Value, WorkflowError> {
        let aggregate = self.current_aggregate().await?;
        if !policy::should_report(match &aggregate.state {
            AggregateState::NoActiveWorkflow => UpdateState::Idle,
            AggregateState::Active(active) => active.object.state,
        }) {
            return Ok(serde_json::Value::Null);
        }
        let value = serde_json::to_value(self.report_for(&aggregate)).expect("ReportedDocument always serializes");
        self.publish(value).await
    }

    /// §4.1 `on_desired_property`: parse the document, resolve the action
    /// per §4.2, drive the state machine, and always acknowledge.
    pub async fn on_desired_property(
        &self,
        doc: DesiredDocument,
        version: u64,
    ) -> Result<serde_json::Value, WorkflowError> {
        let outcome = self.apply_desired(&doc).await;

        let status = if outcome.is_ok() { 200 } else { 400 };
        let ack = serde_json::to_value(policy::build_acknowledgement(&doc, version, status))
            .expect("Acknowledgement always serializes");
        self.publish(ack).await?;

        if outcome.is_ok() {
            // Report before releasing: a terminal Idle/Failed must be
            // reported with the workflow still attached (§3: "destroyed
            // when terminal state is reported AND the persistence record
            // is removed") so `installedUpdateId` is still derivable.
            let report = self.send_progress_report().await?;
            self.finalize_if_terminal().await?;
            Ok(report)
        } else {
            Ok(serde_json::Value::Null)
        }
    }

    async fn apply_desired(&self, doc: &DesiredDocument) -> Result<(), WorkflowError> {
        match doc.action.as_str() {
            "Cancel" => self.apply_cancel(doc).await,
            "ApplyDeployment" | "Download" | "Install" | "Apply" => self.apply_deployment(doc).await,
            other => Err(WorkflowError::MalformedDesiredDocument(format!("unknown action '{other}'"))),
        }
    }

    async fn apply_cancel(&self, doc: &DesiredDocument) -> Result<(), WorkflowError> {
        let aggregate = self.current_aggregate().await?;
        let AggregateState::Active(active) = &aggregate.state else {
            return Ok(());
        };
        let target = doc
            .workflow_id
            .as_deref()
            .map(WorkflowId::from)
            .unwrap_or_else(|| active.object.workflow_id.clone());
        if active.object.workflow_id != target {
            return Ok(());
        }
        self.execute(WorkflowCommand::RequestCancel).await?;

        let handler = self.registry.lookup(active.object.update_type.as_str())?;
        let result = handler.cancel(&active.object).await;
        self.execute(WorkflowCommand::CancelCompleted { result }).await
    }

    async fn apply_deployment(&self, doc: &DesiredDocument) -> Result<(), WorkflowError> {
        let workflow_id = doc
            .workflow_id
            .as_deref()
            .map(WorkflowId::from)
            .ok_or_else(|| WorkflowError::MalformedDesiredDocument("missing workflowId".to_string()))?;
        let update_type = doc
            .update_type
            .as_deref()
            .map(UpdateType::from)
            .ok_or_else(|| WorkflowError::MalformedDesiredDocument("missing updateType".to_string()))?;
        let installed_criteria = doc
            .installed_criteria
            .as_deref()
            .map(InstalledCriteria::from)
            .ok_or_else(|| WorkflowError::MalformedDesiredDocument("missing installedCriteria".to_string()))?;
        let retry_timestamp = doc.retry_timestamp.as_deref().map(RetryTimestamp::from);

        // Validate the update type resolves to a registered handler before
        // touching any state (§7 *Input*: reject before persistence write).
        self.registry.lookup(update_type.as_str())?;

        let aggregate = self.current_aggregate().await?;
        match &aggregate.state {
            AggregateState::NoActiveWorkflow => {
                self.adopt(workflow_id, retry_timestamp, update_type, installed_criteria, doc.steps.len())
                    .await
            }
            AggregateState::Active(active) if active.object.identity_matches(&workflow_id, &retry_timestamp) => {
                // Already running this exact deployment: phase entry is
                // idempotent (§4.3 tie-break), no new command needed.
                Ok(())
            }
            AggregateState::Active(active) if active.object.state.is_terminal() => {
                self.execute(WorkflowCommand::ReleaseTerminal).await?;
                self.persistence
                    .clear()
                    .map_err(|e| WorkflowError::PersistenceCorrupt(e.to_string()))?;
                self.adopt(workflow_id, retry_timestamp, update_type, installed_criteria, doc.steps.len())
                    .await
            }
            AggregateState::Active(active) => Err(WorkflowError::ConflictingWorkflow {
                active_id: active.object.workflow_id.as_str().to_string(),
            }),
        }
    }

    async fn adopt(
        &self,
        workflow_id: WorkflowId,
        retry_timestamp: Option<RetryTimestamp>,
        update_type: UpdateType,
        installed_criteria: InstalledCriteria,
        step_count: usize,
    ) -> Result<(), WorkflowError> {
        let work_folder = self.work_folder_for(&workflow_id);
        self.execute(WorkflowCommand::Adopt {
            workflow_id,
            retry_timestamp,
            update_type,
            installed_criteria,
            work_folder,
            step_count,
        })
        .await
    }

    async fn finalize_if_terminal(&self) -> Result<(), WorkflowError> {
        let aggregate = self.current_aggregate().await?;
        if aggregate_is_terminal(&aggregate) {
            self.persistence
                .clear()
                .map_err(|e| WorkflowError::PersistenceCorrupt(e.to_string()))?;
            self.execute(WorkflowCommand::ReleaseTerminal).await?;
        }
        Ok(())
    }

    /// §4.1 `do_work`: a single cooperative tick. Advances at most one
    /// phase transition so no call blocks longer than one handler
    /// invocation (§5) — entering a phase (`Begin*`) and running it are
    /// two separate ticks, so every state in the §4.3 graph, including
    /// the `*Started` states, is reported to the twin on its own.
    pub async fn do_work(&self) -> Result<serde_json::Value, WorkflowError> {
        let aggregate = self.current_aggregate().await?;
        let AggregateState::Active(active) = &aggregate.state else {
            return Ok(serde_json::Value::Null);
        };

        if active.cancel_requested {
            let handler = self.registry.lookup(active.object.update_type.as_str())?;
            let result = handler.cancel(&active.object).await;
            self.execute(WorkflowCommand::CancelCompleted { result }).await?;
            let report = self.send_progress_report().await?;
            self.finalize_if_terminal().await?;
            return Ok(report);
        }

        if active.awaiting_verification {
            return self.send_progress_report().await;
        }

        match active.object.state {
            UpdateState::DeploymentInProgress => {
                self.execute(WorkflowCommand::BeginDownload).await?;
            }
            // Re-entered on every tick until the handler's phase call
            // stops returning InProgress (§4.1 "advances any non-blocking
            // phase, e.g. polling a download"; §5 "return InProgress").
            UpdateState::DownloadStarted => {
                self.run_phase(Phase::Download).await?;
            }
            UpdateState::DownloadSucceeded => {
                self.execute(WorkflowCommand::BeginInstall).await?;
            }
            UpdateState::InstallStarted => {
                self.run_phase(Phase::Install).await?;
            }
            UpdateState::InstallSucceeded => {
                self.execute(WorkflowCommand::BeginApply).await?;
            }
            // Unlike Download/Install, `ApplyStarted` does not move on to
            // a new reported state once a reboot/restart is pending (the
            // workflow waits for the next boot's `ResumeVerified`), so the
            // "already completed" guard stays explicit here.
            UpdateState::ApplyStarted if active.object.result.result_code == crate::result::ResultCode::Unknown(0) => {
                self.run_phase(Phase::Apply).await?;
            }
            _ => {}
        }

        let report = self.send_progress_report().await?;
        self.finalize_if_terminal().await?;
        Ok(report)
    }

    async fn run_phase(&self, phase: Phase) -> Result<(), WorkflowError> {
        let aggregate = self.current_aggregate().await?;
        let AggregateState::Active(active) = &aggregate.state else {
            return Ok(());
        };
        let handler = self.registry.lookup(active.object.update_type.as_str())?;
        let result = match phase {
            Phase::Download => self.run_download_steps(&active.object, handler.as_ref()).await?,
            Phase::Install => handler.install(&active.object).await,
            Phase::Apply => handler.apply(&active.object).await,
        };

        if result.is_in_progress() {
            return Ok(());
        }

        if matches!(phase, Phase::Apply) && (result.requests_reboot() || result.requests_agent_restart()) {
            self.persist_before_reboot(&active.object, &result)?;
        }

        match phase {
            Phase::Download => self.execute(WorkflowCommand::DownloadCompleted { result }).await,
            Phase::Install => self.execute(WorkflowCommand::InstallCompleted { result }).await,
            Phase::Apply => {
                let requests_reboot = result.requests_reboot();
                let requests_restart = result.requests_agent_restart();
                self.execute(WorkflowCommand::ApplyCompleted { result }).await?;
                if requests_reboot {
                    self.capabilities.reboot_system();
                } else if requests_restart {
                    self.capabilities.restart_agent();
                }
                Ok(())
            }
        }
    }

    /// Drives the download phase one step at a time, issuing
    /// `StepCompleted` as each one finishes (§3 invariant 6: root result
    /// mirrors the first failing step, or the last step's on full
    /// success). Steps model the individual files `Download` fetches
    /// (§4.4: "Fetch and verify all files"); `Install`/`Apply` commit the
    /// staged batch as a whole and are not stepped. Stops at the first
    /// failing step — later steps are left unrun (§8 S6).
    async fn run_download_steps(
        &self,
        workflow: &crate::workflow::WorkflowObject,
        handler: &dyn ContentHandler,
    ) -> Result<OperationResult, WorkflowError> {
        if workflow.steps.is_empty() {
            return Ok(handler.download(workflow, None).await);
        }

        for step in &workflow.steps {
            if step.has_run() {
                continue;
            }
            let result = handler.download(workflow, Some(step.index)).await;
            let failed = result.is_failure();
            self.execute(WorkflowCommand::StepCompleted { index: step.index, result }).await?;
            if failed {
                break;
            }
        }

        let aggregate = self.current_aggregate().await?;
        match &aggregate.state {
            AggregateState::Active(active) => Ok(active.object.result.clone()),
            AggregateState::NoActiveWorkflow => Ok(OperationResult::failure(0, "workflow released mid-step")),
        }
    }

    /// Writes the resume record with `result` already folded in, since
    /// the aggregate itself is only updated by the `ApplyCompleted`
    /// command issued right after this call — the persisted snapshot
    /// must reflect the about-to-be-committed outcome, not the stale one.
    fn persist_before_reboot(
        &self,
        workflow: &crate::workflow::WorkflowObject,
        result: &OperationResult,
    ) -> Result<(), WorkflowError> {
        let mut pending = workflow.clone();
        pending.result = result.clone();

        let reporting_json = serde_json::to_value(reporting::serialize(Some(&pending), pending.state))
            .expect("ReportedDocument always serializes");
        let record = ResumeRecord {
            workflow_id: pending.workflow_id.clone(),
            retry_timestamp: pending.retry_timestamp.clone(),
            update_type: pending.update_type.clone(),
            installed_criteria: pending.installed_criteria.clone(),
            work_folder: pending.work_folder.clone(),
            current_state: format!("{:?}", pending.state),
            last_reported_state: format!("{:?}", pending.last_reported_state),
            reporting_json,
        };
        self.persistence
            .save(&record)
            .map_err(|e| WorkflowError::PersistenceCorrupt(e.to_string()))
    }

    /// §4.1 `on_destroy`: best-effort shutdown. Persistence already
    /// covers resume; there is nothing further to flush since every
    /// command commit is itself synchronously fsynced.
    pub async fn on_destroy(&self) {
        tracing::info!("workflow engine shutting down");
    }
}

enum Phase {
    Download,
    Install,
    Apply,
}

fn aggregate_is_terminal(aggregate: &WorkflowAggregate) -> bool {
    match &aggregate.state {
        AggregateState::NoActiveWorkflow => false,
        AggregateState::Active(active) => active.object.state.is_terminal(),
    }
}

fn map_aggregate_error(error: AggregateError<WorkflowError>) -> WorkflowError {
    match error {
        AggregateError::UserError(err) => err,
        AggregateError::AggregateConflict => WorkflowError::ConcurrencyConflict {
            message: "aggregate was modified concurrently".to_string(),
        },
        err => WorkflowError::StorageFailure { message: err.to_string() },
    }
}

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod tests;
