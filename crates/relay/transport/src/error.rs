//! Broker errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("publish to topic '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("invalid topic or group name: {0}")]
    InvalidName(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
