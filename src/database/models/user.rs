use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::repository::Entity;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub username: String,
    /// SHA-256 hex digest, never the plain password
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// New account with `plain_password` hashed
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
        plain_password: &str,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            username: username.into(),
            password: hash_password(plain_password),
            role: role.into(),
            created_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "email", "username", "password", "role", "created_at"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn before_insert(&mut self) {
        self.created_at.get_or_insert_with(Utc::now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;

    #[test]
    fn new_user_stores_hashed_password() {
        let user = User::new("Admin", "admin@example.com", "admin", "pwd", ROLE_ADMIN);
        assert_ne!(user.password, "pwd");
        assert!(verify_password("pwd", &user.password));
        assert!(user.is_admin());
    }

    #[test]
    fn before_insert_stamps_creation_time_once() {
        let mut user = User::new("U", "u@example.com", "u", "pwd", ROLE_USER);
        user.before_insert();
        let first = user.created_at;
        user.before_insert();
        assert!(first.is_some());
        assert_eq!(user.created_at, first);
    }
}
