//! Twin Channel (§6): the cloud transport, consumed as an abstract
//! interface. The real implementation (MQTT/AMQP property callbacks) is
//! an external collaborator; this crate only defines the contract and a
//! fake for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A parsed desired-property document (§4.2's `{action, workflowId,
/// retryTimestamp, updateManifest, fileUrls, ...}`). Deserialized by the
/// Twin Channel glue and handed to `on_desired_property`; this crate
/// never touches the wire format directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredDocument {
    pub action: String,
    #[serde(rename = "workflowId")]
    pub workflow_id: Option<String>,
    #[serde(rename = "retryTimestamp")]
    pub retry_timestamp: Option<String>,
    #[serde(rename = "updateType")]
    pub update_type: Option<String>,
    #[serde(rename = "installedCriteria")]
    pub installed_criteria: Option<String>,
    #[serde(rename = "fileUrls", default)]
    pub file_urls: serde_json::Value,
    #[serde(rename = "updateManifestSignature", default)]
    pub update_manifest_signature: Option<String>,
    #[serde(default)]
    pub steps: Vec<serde_json::Value>,
}

/// `send_reported`'s asynchronous completion: an HTTP-style status code,
/// 2xx meaning success (§6).
pub type SendStatus = u16;

#[async_trait]
pub trait TwinChannel: Send + Sync {
    /// Publish one reported-property document. Implementations may
    /// batch or retry internally; the engine treats any non-2xx
    /// `SendStatus` as a §7 *Transient* failure and retries on the next
    /// tick without advancing the state machine.
    async fn send_reported(&self, payload: serde_json::Value) -> std::io::Result<SendStatus>;
}

/// In-memory fake used by tests and the CLI: records every payload sent
/// and always reports success.
#[derive(Default)]
pub struct FakeTwinChannel {
    sent: Mutex<Vec<serde_json::Value>>,
}

impl FakeTwinChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_payloads(&self) -> Vec<serde_json::Value> {
        self.sent.lock().expect("fake twin mutex poisoned").clone()
    }

    pub fn last_payload(&self) -> Option<serde_json::Value> {
        self.sent.lock().expect("fake twin mutex poisoned").last().cloned()
    }
}

#[async_trait]
impl TwinChannel for FakeTwinChannel {
    async fn send_reported(&self, payload: serde_json::Value) -> std::io::Result<SendStatus> {
        self.sent.lock().expect("fake twin mutex poisoned").push(payload);
        Ok(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_twin_records_every_sent_payload_in_order() {
        let twin = FakeTwinChannel::new();
        twin.send_reported(serde_json::json!({"state": 3})).await.unwrap();
        twin.send_reported(serde_json::json!({"state": 4})).await.unwrap();
        let sent = twin.sent_payloads();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["state"], 3);
        assert_eq!(sent[1]["state"], 4);
    }

    #[test]
    fn desired_document_deserializes_camel_case_fields() {
        let doc: DesiredDocument = serde_json::from_value(serde_json::json!({
            "action": "ApplyDeployment",
            "workflowId": "w1",
            "retryTimestamp": "t1",
            "updateType": "sim/noop:1",
            "installedCriteria": "v2",
        }))
        .unwrap();
        assert_eq!(doc.workflow_id.as_deref(), Some("w1"));
        assert_eq!(doc.update_type.as_deref(), Some("sim/noop:1"));
    }
}
