use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    errors::StoreError,
    repo_types::{normalize_email, NewUser, User},
};

/// SQLSTATE raised by Postgres on a unique index conflict.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Durable collection of users keyed by normalized email.
///
/// `create` is the authority on uniqueness: it must reject a second user with
/// the same email atomically, even when two signups race past a lookup.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    let unique_violation = matches!(
        &err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
    );
    if unique_violation {
        StoreError::DuplicateEmail
    } else {
        StoreError::Unavailable(err.into())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, current_refresh_token_id,
                   created_at, updated_at
            FROM users
            WHERE lower(email) = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, current_refresh_token_id,
                      created_at, updated_at
            "#,
        )
        .bind(&new_user.username)
        .bind(normalize_email(&new_user.email))
        .bind(&new_user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)
    }
}

/// Process-local store. Check and insert happen under one write lock.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&normalize_email(email)).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let email = normalize_email(&new_user.email);
        let mut users = self.users.write().await;
        if users.contains_key(&email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: email.clone(),
            password_hash: new_user.password_hash,
            current_refresh_token_id: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(email, user.clone());
        Ok(user)
    }
}
