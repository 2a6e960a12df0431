//! Per-client sliding-window rate limiting for the HTTP service.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::server::ApiError;

/// Sliding-window limiter: at most `max_requests` per `window` per client.
#[derive(Debug)]
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window` for each client.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_requests,
            window,
        }
    }

    /// Record a request from `client`. Returns `Err(retry_after_secs)` if the
    /// client is over its limit; rejected requests are not recorded.
    ///
    /// # Errors
    ///
    /// Returns the number of seconds until the oldest request in the window expires.
    pub fn check(&mut self, client: &str) -> Result<(), u64> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&mut self, client: &str, now: Instant) -> Result<(), u64> {
        let window = self.window;
        let entries = self.windows.entry(client.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < window);

        if entries.len() >= self.max_requests as usize {
            let oldest = entries.first().copied().unwrap_or(now);
            let retry = window.saturating_sub(now.duration_since(oldest));
            return Err(retry.as_secs().max(1));
        }

        entries.push(now);
        Ok(())
    }
}

/// Shared limiter handle used as middleware state.
pub type SharedRateLimiter = Arc<Mutex<RateLimiter>>;

/// Client key: the peer IP when connection info is available.
fn client_key(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// Rate limiting middleware. Returns 429 with `Retry-After` when exceeded.
pub async fn limit(
    State(limiter): State<SharedRateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&req);

    // MutexGuard is !Send; drop it before awaiting
    let verdict = {
        let Ok(mut guard) = limiter.lock() else {
            return ApiError::Internal("rate limiter lock poisoned".into()).into_response();
        };
        guard.check(&key)
    };

    match verdict {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(client = %key, retry_after, "rate limit exceeded");
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_under_limit() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_ok());
    }

    #[test]
    fn rejects_over_limit_with_retry_after() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("a", start).is_ok());
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(20)),
            Err(40)
        );
    }

    #[test]
    fn isolates_clients() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn window_expiry_frees_capacity() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_ok());
        assert!(limiter.check_at("a", start + Duration::from_secs(5)).is_err());
        assert!(limiter
            .check_at("a", start + Duration::from_secs(10))
            .is_ok());
    }
}
