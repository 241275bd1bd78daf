//! Response message
//!
//! On the wire a response is `{requestId, success, result?, errorMessage?}`
//! where exactly one of `result` / `errorMessage` is present. In memory the
//! XOR is carried by [`Outcome`], and decoding rejects messages that break it.

use crate::error::WireResult;
use crate::ids::RequestId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Terminal outcome of one procedure call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

/// Result message published back to the issuing gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse", into = "RawResponse")]
pub struct Response {
    pub request_id: RequestId,
    pub outcome: Outcome,
}

impl Response {
    pub fn success(request_id: RequestId, result: Value) -> Self {
        Self {
            request_id,
            outcome: Outcome::Success(result),
        }
    }

    pub fn failure(request_id: RequestId, error_message: impl Into<String>) -> Self {
        Self {
            request_id,
            outcome: Outcome::Failure(error_message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(message) => Some(message),
        }
    }

    pub fn to_bytes(&self) -> WireResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    request_id: RequestId,
    success: bool,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

/// `Some` whenever the key is present, so an explicit `null` result is kept
/// apart from a missing one.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<RawResponse> for Response {
    type Error = String;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        let outcome = match (raw.success, raw.result, raw.error_message) {
            (true, Some(result), None) => Outcome::Success(result),
            (false, None, Some(message)) => Outcome::Failure(message),
            (true, _, Some(_)) => {
                return Err(format!(
                    "response {} is successful but carries an errorMessage",
                    raw.request_id
                ))
            }
            (false, Some(_), _) => {
                return Err(format!(
                    "response {} is a failure but carries a result",
                    raw.request_id
                ))
            }
            (true, None, None) => {
                return Err(format!(
                    "response {} is successful but has no result",
                    raw.request_id
                ))
            }
            (false, None, None) => {
                return Err(format!(
                    "response {} is a failure without an errorMessage",
                    raw.request_id
                ))
            }
        };

        Ok(Response {
            request_id: raw.request_id,
            outcome,
        })
    }
}

impl From<Response> for RawResponse {
    fn from(response: Response) -> Self {
        match response.outcome {
            Outcome::Success(result) => RawResponse {
                request_id: response.request_id,
                success: true,
                result: Some(result),
                error_message: None,
            },
            Outcome::Failure(message) => RawResponse {
                request_id: response.request_id,
                success: false,
                result: None,
                error_message: Some(message),
            },
        }
    }
}
