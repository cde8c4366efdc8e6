//! Content Handler Contract (§4.4): the pluggable extension point every
//! update type implements.

pub mod registry;
pub mod simulator;

pub use registry::HandlerRegistry;

use crate::result::OperationResult;
use crate::workflow::{StepIndex, WorkflowObject};
use async_trait::async_trait;

/// Five operations every handler exposes, each taking the active
/// [`WorkflowObject`] and returning an [`OperationResult`].
///
/// Handlers are out of scope for this crate as a general extension
/// point — real implementations (network downloaders, package
/// installers) are external collaborators. [`simulator::SimulatorHandler`]
/// is the one reference implementation kept in-tree, used by the engine's
/// own tests and by `"sim/noop:1"` deployments.
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// Fetch and verify one file referenced by the manifest into
    /// `work_folder`. `step` identifies which of `workflow.steps` this
    /// call is fetching; `None` when the workflow has no steps and the
    /// handler is expected to fetch everything in one call. May fail with
    /// network, integrity, or space errors.
    async fn download(&self, workflow: &WorkflowObject, step: Option<StepIndex>) -> OperationResult;

    /// Apply content to a staging area without committing.
    async fn install(&self, workflow: &WorkflowObject) -> OperationResult;

    /// Commit. May request a reboot or agent restart via the returned
    /// result's code.
    async fn apply(&self, workflow: &WorkflowObject) -> OperationResult;

    /// Roll back pending work. Best-effort; safe to call at any time,
    /// including before any phase has started.
    async fn cancel(&self, workflow: &WorkflowObject) -> OperationResult;

    /// Whether `workflow.installed_criteria` already holds on the
    /// device. Used for post-reboot verification and phase-entry
    /// idempotence.
    async fn is_installed(&self, workflow: &WorkflowObject) -> bool;
}
