//! Domain error taxonomy for the workflow engine.
//!
//! Mirrors the teacher's `domain/errors.rs`: a hand-rolled enum with a
//! manual `Display`/`Error` impl rather than `thiserror`, kept for the
//! engine's command-handling boundary specifically. Boundary code
//! (config loading, `main`) uses `anyhow` instead, per the ambient stack.

use std::fmt;

/// Errors the [`crate::engine::WorkflowAggregate`] can return from
/// `handle()`. Maps onto §7's error taxonomy, minus *Transient* (that
/// class is retried by the caller and never reaches the aggregate) and
/// *Fatal* (construction-time only, surfaced as a plain `anyhow::Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// §7 *Input*: the desired document was malformed or missing a
    /// required field.
    MalformedDesiredDocument(String),
    /// A command was sent to a workflow that doesn't match the currently
    /// active one (wrong id, or none active).
    NoActiveWorkflow,
    /// §4.2: an `ApplyDeployment` arrived for a different, still
    /// non-terminal workflow.
    ConflictingWorkflow { active_id: String },
    /// A command arrived for a state that cannot accept it (e.g. a
    /// `DownloadCompleted` while not in `DownloadStarted`).
    InvalidStateTransition { state: String, command: String },
    /// §7 *Invariant violation*: the persisted record failed to parse.
    PersistenceCorrupt(String),
    /// Step index referenced by a command does not exist on the active
    /// workflow.
    UnknownStep(usize),
    /// §7 *Transient*: the event log was modified concurrently between
    /// load and commit. The caller should reload and retry on the next
    /// tick without treating this as a state-machine error.
    ConcurrencyConflict { message: String },
    /// §7 *Transient*: the event log or snapshot file could not be
    /// read or written.
    StorageFailure { message: String },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::MalformedDesiredDocument(reason) => {
                write!(f, "malformed desired document: {reason}")
            }
            WorkflowError::NoActiveWorkflow => write!(f, "no active workflow"),
            WorkflowError::ConflictingWorkflow { active_id } => {
                write!(f, "workflow '{active_id}' is active and non-terminal")
            }
            WorkflowError::InvalidStateTransition { state, command } => {
                write!(f, "command '{command}' is invalid in state '{state}'")
            }
            WorkflowError::PersistenceCorrupt(reason) => {
                write!(f, "persisted workflow record is corrupt: {reason}")
            }
            WorkflowError::UnknownStep(index) => write!(f, "no step at index {index}"),
            WorkflowError::ConcurrencyConflict { message } => write!(f, "concurrency conflict: {message}"),
            WorkflowError::StorageFailure { message } => write!(f, "storage failure: {message}"),
        }
    }
}

impl std::error::Error for WorkflowError {}
