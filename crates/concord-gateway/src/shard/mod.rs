//! Shard connection management
//!
//! A shard owns one socket at a time and drives it through the gateway state machine:
//! connect, HELLO, IDENTIFY or RESUME, dispatch, and reconnect on failure.

mod handle;
mod runner;
mod state;

pub use handle::ShardHandle;
pub use runner::Shard;
pub use state::ShardState;

pub(crate) use state::ShardStatus;

use crate::protocol::{CloseCode, GatewayMessage};

/// Channel buffer size for outgoing frames
pub(crate) const OUTBOUND_BUFFER_SIZE: usize = 100;

/// A frame queued for the socket writer
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Payload(GatewayMessage),
    /// Send a close frame with this code and stop writing
    Close(u16),
}

/// Out-of-band signals raised by connection tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardSignal {
    /// A heartbeat went unacknowledged for a whole interval
    Zombie,
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionOutcome {
    /// Open a new socket; `resume` keeps the session
    Reconnect { resume: bool },
    /// Non-recoverable close
    Fatal(CloseCode),
    /// Shutdown requested through the handle
    Shutdown,
}

impl ConnectionOutcome {
    /// Close code the client sends when tearing the socket down
    ///
    /// 1000 invalidates the session on the gateway side, so resumable teardowns use 4000.
    pub fn close_code(self) -> u16 {
        match self {
            Self::Reconnect { resume: true } => CloseCode::UnknownError.as_u16(),
            Self::Reconnect { resume: false } | Self::Fatal(_) | Self::Shutdown => 1000,
        }
    }
}
