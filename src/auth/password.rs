use std::sync::Arc;

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::{auth::errors::AuthError, config::Argon2Config};

/// Argon2id hasher. Every call builds its own `Argon2` context, so clones can
/// be moved into blocking tasks and run in parallel.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    // Verified against when the email is unknown, so both login failures cost the same.
    dummy_hash: Arc<str>,
}

impl Argon2Hasher {
    pub fn new(cfg: Argon2Config) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("invalid ARGON2_* parameters")?;
        let mut hasher = Self {
            params,
            dummy_hash: Arc::from(""),
        };
        let dummy = hasher
            .hash("credential-auth-dummy-password")
            .context("hash dummy password")?;
        hasher.dummy_hash = Arc::from(dummy);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AuthError::HashingFailure(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Constant-time check of `plain` against a PHC-encoded hash. The cost
    /// parameters embedded in the hash are used, not the current config.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AuthError::HashingFailure(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burns one verification and always reports failure.
    pub fn verify_dummy(&self, plain: &str) -> bool {
        let _ = self.verify(plain, &self.dummy_hash);
        false
    }
}

/// Server-side password rule. The default enforces nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// Requires at least one lowercase letter, one uppercase letter and one digit.
    pub require_mixed: bool,
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }
        if self.require_mixed {
            let lower = password.chars().any(char::is_lowercase);
            let upper = password.chars().any(char::is_uppercase);
            let digit = password.chars().any(|c| c.is_ascii_digit());
            if !(lower && upper && digit) {
                return Err(AuthError::WeakPassword(
                    "Password must contain uppercase, lowercase and a number".into(),
                ));
            }
        }
        Ok(())
    }
}
