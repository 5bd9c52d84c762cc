use axum::extract::FromRef;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, SignupRequest},
        errors::AuthError,
        jwt::JwtKeys,
        repo_types::{normalize_email, NewUser},
    },
    state::AppState,
};

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(())
}

/// Runs CPU-bound Argon2 work off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::HashingFailure(format!("hashing task failed: {e}")))
}

/// Creates an account and returns a signed token for it.
///
/// The lookup only short-circuits the common case before paying for a hash;
/// the store's own uniqueness check decides concurrent signups.
pub async fn register(state: &AppState, req: SignupRequest) -> Result<String, AuthError> {
    let username = req.username.trim();
    let email = normalize_email(&req.email);
    require("username", username)?;
    require("email", &email)?;
    require("password", &req.password)?;
    state.config.password_policy.check(&req.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let hasher = state.hasher.clone();
    let password = req.password;
    let hash = run_blocking(move || hasher.hash(&password)).await??;

    let user = match state.users.create(NewUser::new(username, &email, hash)).await {
        Ok(user) => user,
        Err(e) => {
            let err = AuthError::from(e);
            if matches!(err, AuthError::DuplicateEmail) {
                warn!(email = %email, "email claimed by a concurrent signup");
            }
            return Err(err);
        }
    };

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(token)
}

/// Checks credentials and returns a signed token. Unknown email and wrong
/// password are indistinguishable to the caller.
pub async fn authenticate(state: &AppState, req: LoginRequest) -> Result<String, AuthError> {
    let email = normalize_email(&req.email);
    require("email", &email)?;
    require("password", &req.password)?;

    let hasher = state.hasher.clone();
    let password = req.password;

    let Some(user) = state.users.find_by_email(&email).await? else {
        run_blocking(move || hasher.verify_dummy(&password)).await?;
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    let stored_hash = user.password_hash.clone();
    let ok = run_blocking(move || hasher.verify(&password, &stored_hash)).await??;
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(token)
}
