//! Strongly typed identifiers for the deployment workflow.
//!
//! These newtypes give the workflow tree type safety without pulling the
//! raw cloud-issued strings around as bare `String`s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Cloud-issued identifier for one deployment, unique per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Service-issued nonce; a change with the same `WorkflowId` forces a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryTimestamp(pub String);

impl RetryTimestamp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RetryTimestamp {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RetryTimestamp {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Selects the content handler, e.g. `"microsoft/swupdate:1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateType(pub String);

impl UpdateType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UpdateType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UpdateType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque string identifying the target installed-version; compared by
/// the handler's `IsInstalled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledCriteria(pub String);

impl InstalledCriteria {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstalledCriteria {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InstalledCriteria {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Absolute path to a deployment's exclusively owned working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkFolder(pub PathBuf);

impl WorkFolder {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for WorkFolder {
    fn from(p: PathBuf) -> Self {
        Self(p)
    }
}

/// Zero-based index of a step within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepIndex(pub usize);

impl StepIndex {
    /// Renders the twin-safe key for this step: `step_<index>`.
    ///
    /// IoT twin keys disallow some punctuation, so colon/dash never appear
    /// here; this is the one place that naming rule is enforced.
    pub fn twin_key(&self) -> String {
        format!("step_{}", self.0)
    }
}

impl fmt::Display for StepIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
