//! Result Model: the `(result_code, extended_result_code, result_details)`
//! triple every phase and step reports.

use serde::{Deserialize, Serialize};

/// Top-level outcome of a phase or step.
///
/// `result_code` is a signed 32-bit value. Positive values in `1..=999`
/// are success variants; `0` and negative values are failures. The
/// specific numbering below is the core's own convention, independent of
/// any handler-specific extended code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Success,
    SuccessRebootRequired,
    SuccessRestartAgentRequired,
    InProgress,
    Cancelled,
    Skipped,
    Failure,
    /// A handler returned a code this core doesn't recognize. Treated as
    /// failure everywhere except that the original numeric value is kept
    /// in `extended_result_code` verbatim (per §4.3 tie-break policy).
    Unknown(i32),
}

impl ResultCode {
    /// Numeric encoding used on the wire and in persisted documents.
    pub fn as_i32(&self) -> i32 {
        match self {
            ResultCode::Success => 1,
            ResultCode::SuccessRebootRequired => 2,
            ResultCode::SuccessRestartAgentRequired => 3,
            ResultCode::InProgress => 4,
            ResultCode::Cancelled => -1,
            ResultCode::Skipped => -2,
            ResultCode::Failure => 0,
            ResultCode::Unknown(code) => *code,
        }
    }

    /// `true` for any of the `Success*` variants.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ResultCode::Success
                | ResultCode::SuccessRebootRequired
                | ResultCode::SuccessRestartAgentRequired
        )
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success() && !matches!(self, ResultCode::InProgress)
    }

    pub fn from_i32(code: i32) -> Self {
        match code {
            1 => ResultCode::Success,
            2 => ResultCode::SuccessRebootRequired,
            3 => ResultCode::SuccessRestartAgentRequired,
            4 => ResultCode::InProgress,
            -1 => ResultCode::Cancelled,
            -2 => ResultCode::Skipped,
            0 => ResultCode::Failure,
            other => ResultCode::Unknown(other),
        }
    }
}

/// Structured sub-error: which component failed and why, independent of
/// the coarse top-level `ResultCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedResultCode(pub i32);

impl ExtendedResultCode {
    pub const NONE: ExtendedResultCode = ExtendedResultCode(0);
}

impl From<i32> for ExtendedResultCode {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Outcome of one phase or step: top code, extended code, optional
/// human-readable detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub result_code: ResultCode,
    pub extended_result_code: ExtendedResultCode,
    pub result_details: Option<String>,
}

impl OperationResult {
    pub fn success() -> Self {
        Self {
            result_code: ResultCode::Success,
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }

    pub fn success_reboot_required() -> Self {
        Self {
            result_code: ResultCode::SuccessRebootRequired,
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }

    pub fn success_restart_agent_required() -> Self {
        Self {
            result_code: ResultCode::SuccessRestartAgentRequired,
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }

    pub fn in_progress() -> Self {
        Self {
            result_code: ResultCode::InProgress,
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            result_code: ResultCode::Cancelled,
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            result_code: ResultCode::Skipped,
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }

    pub fn failure(extended: impl Into<ExtendedResultCode>, details: impl Into<String>) -> Self {
        Self {
            result_code: ResultCode::Failure,
            extended_result_code: extended.into(),
            result_details: Some(details.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.result_code.is_failure()
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.result_code, ResultCode::InProgress)
    }

    pub fn requests_reboot(&self) -> bool {
        matches!(self.result_code, ResultCode::SuccessRebootRequired)
    }

    pub fn requests_agent_restart(&self) -> bool {
        matches!(self.result_code, ResultCode::SuccessRestartAgentRequired)
    }
}

impl Default for OperationResult {
    /// The "nothing has run yet" value: an idle, unset result.
    fn default() -> Self {
        Self {
            result_code: ResultCode::Unknown(0),
            extended_result_code: ExtendedResultCode::NONE,
            result_details: None,
        }
    }
}
