//! WebSocket close codes
//!
//! Gateway-specific close codes and how each one affects the session. The table follows the
//! public gateway documentation.

use serde::{Deserialize, Serialize};

/// What a socket close means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloseClassification {
    /// Reconnect and RESUME the existing session
    Resumable,
    /// Reconnect, but the session is gone: clear it and IDENTIFY
    SessionExpired,
    /// Do not reconnect
    Fatal,
}

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred
    UnknownError = 4000,
    /// Invalid opcode sent
    UnknownOpcode = 4001,
    /// Invalid payload encoding
    DecodeError = 4002,
    /// Sent a payload before identifying
    NotAuthenticated = 4003,
    /// Invalid token
    AuthenticationFailed = 4004,
    /// Sent IDENTIFY twice
    AlreadyAuthenticated = 4005,
    /// Invalid sequence number for RESUME
    InvalidSequence = 4007,
    /// Sending payloads too quickly
    RateLimited = 4008,
    /// Session timed out
    SessionTimedOut = 4009,
    /// Invalid shard in IDENTIFY
    InvalidShard = 4010,
    /// Too many guilds for a single shard
    ShardingRequired = 4011,
    /// Invalid API version
    InvalidApiVersion = 4012,
    /// Invalid intents bitfield
    InvalidIntents = 4013,
    /// Privileged intent not enabled for the application
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// How this close affects the session
    #[must_use]
    pub const fn classification(self) -> CloseClassification {
        match self {
            Self::UnknownError
            | Self::UnknownOpcode
            | Self::DecodeError
            | Self::NotAuthenticated
            | Self::AlreadyAuthenticated
            | Self::RateLimited => CloseClassification::Resumable,
            Self::InvalidSequence | Self::SessionTimedOut => CloseClassification::SessionExpired,
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseClassification::Fatal,
        }
    }

    /// Check if the client should attempt to reconnect after this close code
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(self.classification(), CloseClassification::Fatal)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error occurred",
            Self::UnknownOpcode => "Invalid opcode sent",
            Self::DecodeError => "Invalid payload encoding",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }
}

/// Classify any close code received from the socket
///
/// Normal closure (1000) and going away (1001) invalidate the session. Unknown codes and the
/// remaining standard WebSocket codes are treated as transient network failures.
#[must_use]
pub fn classify_close(code: u16) -> CloseClassification {
    match CloseCode::from_u16(code) {
        Some(code) => code.classification(),
        None if matches!(code, 1000 | 1001) => CloseClassification::SessionExpired,
        None => CloseClassification::Resumable,
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
