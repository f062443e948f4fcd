//! Frame op codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The `op` field of every frame
///
/// Only the ops this client sends or handles are listed; anything else fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// An event was dispatched (server only)
    Dispatch = 0,
    /// Keep the connection alive (client/server)
    Heartbeat = 1,
    /// Start a new session (client only)
    Identify = 2,
    /// Resume a dropped session (client only)
    Resume = 6,
    /// Server asks the client to reconnect and resume (server only)
    Reconnect = 7,
    /// The session was invalidated (server only)
    InvalidSession = 9,
    /// Sent on connect, carries the heartbeat interval (server only)
    Hello = 10,
    /// Heartbeat acknowledged (server only)
    HeartbeatAck = 11,
}

impl OpCode {
    /// `None` for ops this client does not know
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Ops the client writes
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        matches!(self, Self::Heartbeat | Self::Identify | Self::Resume)
    }

    /// Ops the gateway writes
    #[must_use]
    pub const fn is_server_op(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid op code: {value}")))
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
