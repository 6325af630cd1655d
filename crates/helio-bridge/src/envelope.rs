//! The result envelope returned to host code.
//!
//! On the wire an envelope is either `{"success": true, "data": ...}` or
//! `{"success": false, "errorKind": "...", "message": "..."}`.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{BridgeError, ErrorKind};

/// Outcome of one bridge call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    /// The engine produced a result.
    Success {
        /// Parsed engine output.
        data: Value,
    },
    /// The call failed.
    Failure {
        /// Failure classification.
        kind: ErrorKind,
        /// Diagnostic text.
        message: String,
    },
}

impl ResultEnvelope {
    /// Build a success envelope.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    /// Build a failure envelope.
    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Whether the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The data of a success envelope.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// The kind of a failure envelope.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// The message of a failure envelope.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }
}

impl From<BridgeError> for ResultEnvelope {
    fn from(err: BridgeError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }
}

impl Serialize for ResultEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success { data } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                map.end()
            },
            Self::Failure { kind, message } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("errorKind", kind)?;
                map.serialize_entry("message", message)?;
                map.end()
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    success: bool,
    #[serde(default)]
    data: Value,
    error_kind: Option<ErrorKind>,
    #[serde(default)]
    message: String,
}

impl<'de> Deserialize<'de> for ResultEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnvelope::deserialize(deserializer)?;
        if raw.success {
            return Ok(Self::Success { data: raw.data });
        }
        let kind = raw
            .error_kind
            .ok_or_else(|| D::Error::missing_field("errorKind"))?;
        Ok(Self::Failure {
            kind,
            message: raw.message,
        })
    }
}
