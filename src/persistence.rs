//! Persistence Store (§4.6): a single document written atomically before
//! any phase that may be interrupted by a reboot or agent restart, and
//! read back on startup to resume.
//!
//! Distinct from [`crate::event_store`]'s JSONL audit log: this is the
//! literal crash-recovery record the spec names, a single file holding
//! exactly enough to re-instantiate the handler and ask `IsInstalled`.
//! Atomic write-rename and file locking are adapted from the teacher's
//! `event_store::file_store` snapshot helpers.

use crate::workflow::{InstalledCriteria, RetryTimestamp, UpdateType, WorkFolder, WorkflowId};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

/// The §4.6 persisted record: enough to hydrate a [`crate::workflow::WorkflowObject`]
/// and its reported state without replaying the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub workflow_id: WorkflowId,
    pub retry_timestamp: Option<RetryTimestamp>,
    pub update_type: UpdateType,
    pub installed_criteria: InstalledCriteria,
    pub work_folder: WorkFolder,
    pub current_state: String,
    pub last_reported_state: String,
    pub reporting_json: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct PersistenceStore {
    path: PathBuf,
}

impl PersistenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Atomically writes `record`, replacing any prior record. Safe to
    /// call repeatedly across ticks of the same phase (idempotent).
    pub fn save(&self, record: &ResumeRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.lock_exclusive()?;
            std::fs::write(&tmp_path, content)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Loads the persisted record, if any. Returns `Ok(None)` for "no
    /// record" rather than treating it as an error; a record that exists
    /// but fails to parse is reported as an `Err` so the caller can apply
    /// §7's *Invariant violation* policy (discard and report `Failed`).
    pub fn load(&self) -> std::io::Result<Option<ResumeRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        file.lock_shared()?;
        let record: ResumeRecord = serde_json::from_reader(&file)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        Ok(Some(record))
    }

    /// Removes the persisted record. Missing-file is not an error: the
    /// caller may call this defensively on every terminal transition.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
