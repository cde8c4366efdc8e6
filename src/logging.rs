//! Ambient logging: a `tracing`/`tracing-subscriber` init for human-
//! readable logs, plus a JSONL audit trail of every command/event pair
//! the engine processes, adapted from the teacher's `structured_logger`.

use crate::engine::{WorkflowCommand, WorkflowEvent};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Initializes the global `tracing` subscriber. The teacher calls
/// `tracing::debug!`/`warn!` throughout but never wires a subscriber;
/// ambient logging is mandatory here regardless of the spec's
/// Non-goals, so `main` calls this once at startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Serialize, serde::Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub ts: String,
    pub component: String,
    pub event: Value,
}

/// Append-only JSONL record of every command issued to, and event
/// produced by, the workflow aggregate — independent of the §4.6
/// crash-recovery snapshot, useful for post-incident review.
pub struct AuditLog {
    seq: AtomicU64,
    file: Mutex<File>,
}

impl AuditLog {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            seq: AtomicU64::new(0),
            file: Mutex::new(file),
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn log(&self, component: &str, event: impl Serialize) {
        let entry = AuditEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{line}");
                let _ = file.flush();
            }
        }
    }

    pub fn log_command(&self, command: &WorkflowCommand) {
        self.log(
            "workflow",
            serde_json::json!({"type": "command", "command": command}),
        );
    }

    pub fn log_event(&self, event: &WorkflowEvent) {
        self.log("workflow", serde_json::json!({"type": "event", "event": event}));
    }

    pub fn log_report_sent(&self, status: u16) {
        self.log("twin", serde_json::json!({"type": "report_sent", "status": status}));
    }
}
