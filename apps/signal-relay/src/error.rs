use thiserror::Error;

use crate::connection::{ConnectionId, Role};

/// Why an inbound frame could not be turned into a [`ClientMessage`](crate::protocol::ClientMessage).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

impl DecodeError {
    pub fn metric_label(&self) -> &'static str {
        match self {
            DecodeError::InvalidJson(_) => "invalid_json",
            DecodeError::MissingType => "missing_type",
            DecodeError::UnknownType(_) => "unknown_type",
            DecodeError::InvalidPayload(_) => "invalid_payload",
            DecodeError::NotUtf8 => "not_utf8",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("role already declared as {current}")]
    AlreadyDeclared { current: Role },
    #[error("cannot declare the unset role")]
    Unset,
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection id {0} is already registered")]
    IdCollision(ConnectionId),
}
