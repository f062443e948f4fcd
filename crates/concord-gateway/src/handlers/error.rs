//! Handler error types

use crate::protocol::CloseCode;

/// Handler error type
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A frame the gateway sent could not be interpreted
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The writer task is gone; the socket is already closing
    #[error("Outbound channel closed")]
    ChannelClosed,
}

impl HandlerError {
    /// Close code sent when the connection is dropped because of this error
    pub fn to_close_code(&self) -> CloseCode {
        match self {
            Self::InvalidPayload(_) => CloseCode::DecodeError,
            Self::ChannelClosed => CloseCode::UnknownError,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidPayload(e.to_string())
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_codes_stay_resumable() {
        for error in [
            HandlerError::InvalidPayload("missing d".to_string()),
            HandlerError::ChannelClosed,
        ] {
            assert!(error.to_close_code().should_reconnect());
        }
    }
}
