//! Orchestration Policies (§4.7): acknowledgement redaction, the
//! "should report?" filter, and step-key naming.

use crate::twin::DesiredDocument;
use crate::workflow::{StepIndex, UpdateState};
use serde::Serialize;

/// §4.7 *Redaction*: before echoing a desired document back as an
/// acknowledgement, `updateManifestSignature` and `fileUrls` are nulled
/// out to bound twin payload size. §8 property 5 requires this to hold
/// for every acknowledgement this core ever produces.
pub fn redact_for_acknowledgement(desired: &DesiredDocument) -> DesiredDocument {
    let mut redacted = desired.clone();
    redacted.file_urls = serde_json::Value::Null;
    redacted.update_manifest_signature = None;
    redacted
}

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    #[serde(flatten)]
    pub desired: DesiredDocument,
    #[serde(rename = "ackVersion")]
    pub version: u64,
    #[serde(rename = "ackStatus")]
    pub status: u16,
}

/// Builds the acknowledgement payload for one desired-property update:
/// the redacted reflection plus the numeric status and version (§4.1).
pub fn build_acknowledgement(desired: &DesiredDocument, version: u64, status: u16) -> Acknowledgement {
    Acknowledgement {
        desired: redact_for_acknowledgement(desired),
        version,
        status,
    }
}

/// §4.7 *Should report?*: every [`UpdateState`] this core can reach is
/// one of the §3 reportable states (there are no further internal
/// sub-states modeled as `UpdateState` values), so this always holds for
/// well-formed input. Kept as an explicit gate — rather than inlined as
/// `true` at call sites — so a future internal state can be excluded
/// without touching every call site.
pub fn should_report(_state: UpdateState) -> bool {
    true
}

/// §4.7 *Step-key naming*: `step_<index>`, ASCII decimal, no punctuation.
/// Delegates to [`StepIndex::twin_key`]; kept here too since this is
/// where policy-level callers look for it.
pub fn step_key(index: StepIndex) -> String {
    index.twin_key()
}
