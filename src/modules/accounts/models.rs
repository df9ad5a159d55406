use bookshelf_authz::Principal;
use serde::Serialize;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    /// Unix timestamp (seconds)
    pub date_joined: i64,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            is_superuser: self.is_superuser,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            is_superuser: self.is_superuser,
        }
    }
}

/// What pages show about the signed-in user.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub is_superuser: bool,
}

/// Input for creating an account; the password is already hashed.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: String,
    pub is_superuser: bool,
}
