use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{bail, Context};

use crate::auth::password::PasswordPolicy;

/// Placeholder signing secret for local development only.
pub const DEV_JWT_SECRET: &str = "secret";

/// Upper bound for `JWT_TTL_MINUTES` (one year).
pub const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Environment,
    DevelopmentDefault,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub secret_source: SecretSource,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("secret_source", &self.secret_source)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub client_url: Option<String>,
    pub jwt: JwtConfig,
    pub password_policy: PasswordPolicy,
    pub argon2: Argon2Config,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let production = get("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let (secret, secret_source) = match get("JWT_SECRET") {
            Some(secret) => (secret, SecretSource::Environment),
            None if production => bail!("JWT_SECRET must be set when APP_ENV=production"),
            None => (DEV_JWT_SECRET.to_string(), SecretSource::DevelopmentDefault),
        };

        let jwt = JwtConfig {
            secret,
            secret_source,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "credential-auth".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "credential-auth-clients".into()),
            ttl_minutes: parse_or(&get, "JWT_TTL_MINUTES", 60)?,
        };
        if !(1..=MAX_JWT_TTL_MINUTES).contains(&jwt.ttl_minutes) {
            bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_JWT_TTL_MINUTES}, got {}",
                jwt.ttl_minutes
            );
        }

        let password_policy = PasswordPolicy {
            min_length: parse_or(&get, "PASSWORD_MIN_LENGTH", 0)?,
            require_mixed: parse_or(&get, "PASSWORD_REQUIRE_MIXED", false)?,
        };

        let argon_defaults = Argon2Config::default();
        let argon2 = Argon2Config {
            memory_kib: parse_or(&get, "ARGON2_MEMORY_KIB", argon_defaults.memory_kib)?,
            iterations: parse_or(&get, "ARGON2_ITERATIONS", argon_defaults.iterations)?,
            parallelism: parse_or(&get, "ARGON2_PARALLELISM", argon_defaults.parallelism)?,
        };

        let limit_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: parse_or(&get, "RATE_LIMIT_MAX_REQUESTS", limit_defaults.max_requests)?,
            window: Duration::from_secs(parse_or(
                &get,
                "RATE_LIMIT_WINDOW_SECS",
                limit_defaults.window.as_secs(),
            )?),
        };

        Ok(Self {
            database_url,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 4000)?,
            production,
            client_url: get("CLIENT_URL"),
            jwt,
            password_policy,
            argon2,
            rate_limit,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
