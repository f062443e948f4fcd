//! Gateway entities
//!
//! Wire objects delivered by dispatch events. Unknown fields are kept in `extra` so a cached
//! entity is always the full representation the gateway sent.

mod channel;
mod guild;
mod interaction;
mod message;
mod ready;
mod user;
mod voice_state;

pub use channel::Channel;
pub use guild::Guild;
pub use interaction::{Interaction, InteractionData, Member};
pub use message::Message;
pub use ready::{Ready, UnavailableGuild};
pub use user::User;
pub use voice_state::VoiceState;
