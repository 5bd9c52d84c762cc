use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                                 // assigned by the store
    pub username: String,                         // display label, not unique
    pub email: String,                            // lowercased, unique
    #[serde(skip_serializing)]
    pub password_hash: String,                    // Argon2 PHC string, never exposed
    pub current_refresh_token_id: Option<String>, // reserved, always NULL for now
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied at signup; everything else is filled in by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password_hash: String) -> Self {
        Self {
            username: username.trim().to_string(),
            email: normalize_email(email),
            password_hash,
        }
    }
}

/// Lookup key for a user: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
