//! Gateway protocol definitions
//!
//! Defines the WebSocket protocol including op codes, frame formats, close codes and intents.

mod close_codes;
mod intents;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{classify_close, CloseClassification, CloseCode};
pub use intents::Intents;
pub use messages::{DecodeError, GatewayMessage};
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload};

/// Gateway API version requested on connect
pub const API_VERSION: u8 = 10;
