//! Interaction entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::User;
use crate::value_objects::Snowflake;

/// An interaction (slash command, component click, modal submit, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,
    /// Raw interaction type (2 = application command, 3 = message component, ...)
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
    /// Set when invoked inside a guild
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    /// Set when invoked in a DM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Guild member wrapper of the invoking user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Interaction data; only the fields needed for routing are typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Interaction {
    /// Raw type of a message component interaction
    pub const MESSAGE_COMPONENT: u8 = 3;

    /// The user who triggered the interaction, whether in a guild or a DM
    #[must_use]
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
    }

    /// Id of the invoking user
    #[must_use]
    pub fn invoker_id(&self) -> Option<Snowflake> {
        self.invoker().map(|user| user.id)
    }

    /// Custom id of the clicked component, if this is a component interaction
    #[must_use]
    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.custom_id.as_deref())
    }

    /// Check if this interaction came from a message component
    #[must_use]
    pub fn is_component(&self) -> bool {
        self.kind == Self::MESSAGE_COMPONENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_component_interaction() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "id": "1",
            "application_id": "2",
            "type": 3,
            "token": "tok",
            "guild_id": "42",
            "member": {"user": {"id": "7", "username": "ferris"}, "nick": null},
            "data": {"custom_id": "btn-a", "component_type": 2}
        }))
        .unwrap();

        assert!(interaction.is_component());
        assert_eq!(interaction.invoker_id(), Some(Snowflake::new(7)));
        assert_eq!(interaction.custom_id(), Some("btn-a"));
    }

    #[test]
    fn test_dm_interaction_uses_user() {
        let interaction: Interaction = serde_json::from_value(serde_json::json!({
            "id": "1",
            "application_id": "2",
            "type": 2,
            "user": {"id": "9", "username": "dm-user"},
            "data": {"name": "ping"}
        }))
        .unwrap();

        assert!(!interaction.is_component());
        assert_eq!(interaction.invoker_id(), Some(Snowflake::new(9)));
        assert_eq!(interaction.custom_id(), None);
    }
}
