//! # concord-core
//!
//! Domain layer shared by the gateway crates: the snowflake id type and the entities carried by
//! dispatch events. Entities keep the fields the client relies on and preserve every other
//! field of the wire object untouched.

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, Guild, Interaction, InteractionData, Member, Message, Ready, UnavailableGuild, User,
    VoiceState,
};
pub use value_objects::{Snowflake, SnowflakeParseError};
