//! Gateway frame format

use super::{IdentifyPayload, OpCode, ResumePayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown op code: {0}")]
    UnknownOpcode(u8),

    #[error("Binary frames are not supported")]
    Binary,
}

/// Gateway frame
///
/// All frames sent over the WebSocket connection follow this format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event name (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event data payload; always present on the wire, `null` when empty
    pub d: Option<Value>,
}

/// Inbound frame before op code validation
#[derive(Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    d: Option<Value>,
}

impl GatewayMessage {
    /// Create a Heartbeat frame (op=1) carrying the last received sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            t: None,
            s: None,
            d: last_sequence.map(Value::from),
        }
    }

    /// Create an Identify frame (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self {
            op: OpCode::Identify,
            t: None,
            s: None,
            d: serde_json::to_value(payload).ok(),
        }
    }

    /// Create a Resume frame (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self {
            op: OpCode::Resume,
            t: None,
            s: None,
            d: serde_json::to_value(payload).ok(),
        }
    }

    /// Create a Dispatch frame (op=0)
    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    /// Deserialize the `d` field
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.d.clone().unwrap_or(Value::Null))
    }

    /// Interpret the `d` field of an Invalid Session frame (op=9)
    #[must_use]
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        let raw: RawFrame = serde_json::from_str(json)?;
        let op = OpCode::from_u8(raw.op).ok_or(DecodeError::UnknownOpcode(raw.op))?;
        Ok(Self {
            op,
            t: raw.t,
            s: raw.s,
            d: raw.d,
        })
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
