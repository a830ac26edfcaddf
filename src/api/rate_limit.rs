//! Fixed-window rate limiting for the authentication endpoints.
//!
//! Each (action, client address) pair owns a counter and the instant its
//! window ends. The first request of a window starts it; once the counter
//! reaches the action's maximum, further requests are denied until the
//! window ends, after which the next request opens a fresh window.
//!
//! State is process-local. Buckets are only dropped by the optional sweep
//! task, so without it the map grows with the number of distinct clients.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

/// Bucket used when no client address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limited actions, each with its own limit and key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Login,
    Register,
}

impl RateLimitAction {
    pub fn prefix(&self) -> &'static str {
        match self {
            RateLimitAction::Login => "login",
            RateLimitAction::Register => "register",
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Denied; the client may retry after this many seconds
    Denied(u64),
}

/// Thread-safe fixed-window limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Window and maximum for an action, from configuration
    pub fn limits(&self, action: RateLimitAction) -> (Duration, u32) {
        match action {
            RateLimitAction::Login => (
                Duration::from_secs(self.config.login_window_seconds),
                self.config.login_max,
            ),
            RateLimitAction::Register => (
                Duration::from_secs(self.config.register_window_seconds),
                self.config.register_max,
            ),
        }
    }

    /// Count a request from `client` against `action`
    pub fn check_action(&self, action: RateLimitAction, client: &str) -> Decision {
        if !self.config.enabled {
            return Decision::Allowed;
        }
        let (window, max) = self.limits(action);
        let key = format!("{}:{}", action.prefix(), client);
        self.check(&key, window, max)
    }

    pub fn check(&self, key: &str, window: Duration, max: u32) -> Decision {
        self.check_at(key, window, max, Instant::now())
    }

    /// Core fixed-window step with an explicit clock.
    ///
    /// The bucket entry is held locked for the whole read-modify-write, so
    /// concurrent requests for one key never lose an increment.
    pub fn check_at(&self, key: &str, window: Duration, max: u32, now: Instant) -> Decision {
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            reset_at: now + window,
        });

        if now >= bucket.reset_at || bucket.count == 0 {
            bucket.count = 1;
            bucket.reset_at = now + window;
            return Decision::Allowed;
        }

        if bucket.count >= max {
            let remaining = bucket.reset_at.saturating_duration_since(now);
            return Decision::Denied(retry_after_secs(remaining));
        }

        bucket.count += 1;
        Decision::Allowed
    }

    /// Drop buckets whose window has ended
    pub fn cleanup_expired(&self) {
        self.cleanup_expired_at(Instant::now());
    }

    fn cleanup_expired_at(&self, now: Instant) {
        self.buckets.retain(|_, bucket| bucket.reset_at > now);
    }

    /// Get the number of tracked buckets (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Whole seconds until reset, rounded up and never below one
fn retry_after_secs(remaining: Duration) -> u64 {
    let millis = remaining.as_millis() as u64;
    millis.div_ceil(1000).max(1)
}

fn header_value<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// socket peer, then the shared "unknown" bucket.
pub fn extract_client_ip(request: &Request<Body>) -> String {
    if let Some(forwarded) = header_value(request, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next().map(|s| s.trim()) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = header_value(request, "x-real-ip") {
        return real_ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

/// Rate limiting middleware for POST /auth/login
pub async fn rate_limit_login(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_action(state, request, next, RateLimitAction::Login).await
}

/// Rate limiting middleware for POST /auth/register
///
/// Only counts attempts while registration is open; a closed endpoint
/// always answers 410.
pub async fn rate_limit_register(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.auth.allow_registration {
        return next.run(request).await;
    }
    rate_limit_with_action(state, request, next, RateLimitAction::Register).await
}

async fn rate_limit_with_action(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    action: RateLimitAction,
) -> Response {
    let client = extract_client_ip(&request);

    match state.rate_limiter.check_action(action, &client) {
        Decision::Allowed => next.run(request).await,
        Decision::Denied(retry_after) => {
            tracing::warn!(
                client = %client,
                action = action.prefix(),
                retry_after,
                "Rate limit exceeded"
            );
            ApiError::rate_limited(retry_after).into_response()
        }
    }
}

/// Spawn a background task to periodically drop expired buckets
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} buckets remaining",
                rate_limiter.entry_count()
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(600);

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            login_max: 3,
            login_window_seconds: 600,
            register_max: 2,
            register_window_seconds: 600,
            cleanup_interval_seconds: 0,
        }
    }

    #[test]
    fn test_allows_up_to_max_then_denies() {
        let limiter = RateLimiter::new(test_config());
        let start = Instant::now();

        for i in 0..3 {
            assert_eq!(
                limiter.check_at("login:1.2.3.4", WINDOW, 3, start),
                Decision::Allowed,
                "request {} should pass",
                i
            );
        }

        let later = start + Duration::from_secs(100);
        assert_eq!(
            limiter.check_at("login:1.2.3.4", WINDOW, 3, later),
            Decision::Denied(500)
        );
    }

    #[test]
    fn test_retry_after_rounds_up_and_is_at_least_one() {
        let limiter = RateLimiter::new(test_config());
        let start = Instant::now();
        limiter.check_at("k", WINDOW, 1, start);

        let almost = start + WINDOW - Duration::from_millis(1500);
        assert_eq!(limiter.check_at("k", WINDOW, 1, almost), Decision::Denied(2));

        let edge = start + WINDOW - Duration::from_millis(1);
        assert_eq!(limiter.check_at("k", WINDOW, 1, edge), Decision::Denied(1));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new(test_config());
        let start = Instant::now();

        limiter.check_at("k", WINDOW, 1, start);
        assert!(matches!(
            limiter.check_at("k", WINDOW, 1, start + Duration::from_secs(1)),
            Decision::Denied(_)
        ));
        assert_eq!(limiter.check_at("k", WINDOW, 1, start + WINDOW), Decision::Allowed);
        assert!(matches!(
            limiter.check_at("k", WINDOW, 1, start + WINDOW),
            Decision::Denied(_)
        ));
    }

    #[test]
    fn test_denied_requests_do_not_extend_window() {
        let limiter = RateLimiter::new(test_config());
        let start = Instant::now();
        limiter.check_at("k", WINDOW, 1, start);
        for s in 1..10 {
            limiter.check_at("k", WINDOW, 1, start + Duration::from_secs(s));
        }
        assert_eq!(limiter.check_at("k", WINDOW, 1, start + WINDOW), Decision::Allowed);
    }

    #[test]
    fn test_actions_and_clients_are_separate_buckets() {
        let limiter = RateLimiter::new(test_config());

        for _ in 0..2 {
            assert_eq!(limiter.check_action(RateLimitAction::Register, "10.0.0.1"), Decision::Allowed);
        }
        assert!(matches!(
            limiter.check_action(RateLimitAction::Register, "10.0.0.1"),
            Decision::Denied(_)
        ));

        assert_eq!(limiter.check_action(RateLimitAction::Login, "10.0.0.1"), Decision::Allowed);
        assert_eq!(limiter.check_action(RateLimitAction::Register, "10.0.0.2"), Decision::Allowed);
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert_eq!(limiter.check_action(RateLimitAction::Login, "10.0.0.1"), Decision::Allowed);
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_cleanup_drops_only_ended_windows() {
        let limiter = RateLimiter::new(test_config());
        let start = Instant::now();

        limiter.check_at("short", Duration::from_secs(1), 5, start);
        limiter.check_at("long", WINDOW, 5, start);
        assert_eq!(limiter.entry_count(), 2);

        limiter.cleanup_expired_at(start + Duration::from_secs(2));
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let limiter = Arc::new(RateLimiter::new(test_config()));
        let start = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.check_at("shared", WINDOW, 100, start) == Decision::Allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }

    fn request_with(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/auth/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_client_ip_precedence() {
        let req = request_with(&[("x-forwarded-for", " 203.0.113.7, 10.0.0.1"), ("x-real-ip", "10.9.9.9")]);
        assert_eq!(extract_client_ip(&req), "203.0.113.7");

        let req = request_with(&[("x-real-ip", "10.9.9.9")]);
        assert_eq!(extract_client_ip(&req), "10.9.9.9");

        let mut req = request_with(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 5555))));
        assert_eq!(extract_client_ip(&req), "192.168.1.5");

        assert_eq!(extract_client_ip(&request_with(&[])), UNKNOWN_CLIENT);
    }
}
