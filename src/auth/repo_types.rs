use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User record as persisted in the users file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,              // unique user ID
    pub name: String,          // display name
    pub email: String,         // natural key, case-sensitive
    pub password_hash: String, // Argon2 PHC string
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash,
        }
    }
}
