//! Request envelope
//!
//! An [`Envelope`] is created by the gateway for every call attempt and
//! published exactly once to the target worker pool's request topic.

use crate::error::{WireError, WireResult};
use crate::ids::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A procedure invocation as submitted by a caller, before routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureCall {
    /// Logical worker pool (e.g. `CLIENT-1`)
    pub client_type: String,

    /// Registry key of the procedure on the worker side
    pub procedure_name: String,

    /// Procedure-specific parameters
    #[serde(default)]
    pub parameters: Value,
}

impl ProcedureCall {
    pub fn new(
        client_type: impl Into<String>,
        procedure_name: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            client_type: client_type.into(),
            procedure_name: procedure_name.into(),
            parameters,
        }
    }
}

/// Caller identity, already verified upstream and forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl ExecutionMetadata {
    pub fn new(user_id: Option<String>, tenant_id: Option<String>) -> Self {
        Self {
            user_id,
            tenant_id,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Request message published to a worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub request_id: RequestId,
    pub client_type: String,
    pub procedure_name: String,
    #[serde(default)]
    pub parameters: Value,
    pub reply_to: String,
    #[serde(default)]
    pub metadata: ExecutionMetadata,
    /// Stamped by the gateway; envelopes from other producers may omit it.
    #[serde(default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl Envelope {
    /// Build an envelope for `call` with a freshly generated request id.
    pub fn new(
        call: ProcedureCall,
        reply_to: impl Into<String>,
        metadata: ExecutionMetadata,
    ) -> Self {
        Self {
            request_id: RequestId::generate(),
            client_type: call.client_type,
            procedure_name: call.procedure_name,
            parameters: call.parameters,
            reply_to: reply_to.into(),
            metadata,
            issued_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> WireResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an envelope, rejecting ones a worker could not answer.
    pub fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        if envelope.reply_to.trim().is_empty() {
            return Err(WireError::Invalid(format!(
                "envelope {} has no replyTo topic",
                envelope.request_id
            )));
        }
        Ok(envelope)
    }
}

/// The correlation fields of an envelope, readable even when the rest of
/// the message is not.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeHeader {
    pub request_id: RequestId,
    pub reply_to: String,
}

impl EnvelopeHeader {
    /// Salvage the header of a message that failed full decoding. `None`
    /// when there is nowhere to send an answer.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let header: EnvelopeHeader = serde_json::from_slice(bytes).ok()?;
        if header.reply_to.trim().is_empty() {
            return None;
        }
        Some(header)
    }
}
