//! Fixed-window request limiter keyed by client IP, applied to the auth routes.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::Instant,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{auth::dto::MessageResponse, config::RateLimitConfig};

/// Windows are pruned once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request for `key`; false once the window's budget is spent.
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let period = self.config.window;
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < period);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(window.started) >= period {
            window.started = now;
            window.hits = 0;
        }
        if window.hits >= self.config.max_requests {
            return false;
        }
        window.hits += 1;
        true
    }
}

pub async fn limit_by_peer(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into());

    if !limiter.check(&key).await {
        warn!(client = %key, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse {
                message: "Too many requests, please try again later.".into(),
            }),
        )
            .into_response();
    }

    next.run(req).await
}
