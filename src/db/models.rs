use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Server-wide key/value property
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Property {
    pub id: String,
    pub value: String,
}

/// Stored user account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC hash
    #[serde(skip_serializing)]
    pub password: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user account. `new_password` is plaintext and is hashed by
/// [`UserRepo::put`](crate::db::UserRepo::put) before it reaches the table.
#[derive(Clone)]
pub struct NewUser {
    pub id: String,
    pub user_name: String,
    pub name: String,
    pub email: String,
    pub new_password: String,
    pub is_admin: bool,
}

impl NewUser {
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("new_password", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}
