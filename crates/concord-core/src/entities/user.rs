//! User entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value_objects::Snowflake;

/// A user account (bot or human)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    /// Remaining wire fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Name shown in clients: the global name if set, otherwise the username
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_keeps_unknown_fields() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "7",
            "username": "ferris",
            "public_flags": 64
        }))
        .unwrap();

        assert_eq!(user.id, Snowflake::new(7));
        assert_eq!(user.display_name(), "ferris");
        assert_eq!(user.extra.get("public_flags"), Some(&Value::from(64)));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["public_flags"], 64);
    }
}
