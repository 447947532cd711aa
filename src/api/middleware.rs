//! API Middleware (Rate Limiting, Logging)

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::handlers::AppState;
use super::types::{ApiError, ApiResponse};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window
    pub requests_per_window: u32,
    /// Window duration
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,  // 100 requests
            window_duration: Duration::from_secs(60), // per minute
        }
    }
}

impl RateLimitConfig {
    /// `GH_RATE_LIMIT_PER_MINUTE` overrides the request budget
    pub fn from_env() -> Self {
        let requests_per_window = std::env::var("GH_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        Self {
            requests_per_window,
            ..Self::default()
        }
    }
}

/// In-memory fixed-window rate limiter, keyed per client
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    /// Check if request is allowed, returns (allowed, remaining, reset_seconds)
    pub fn check(&self, key: &str) -> (bool, u32, u64) {
        let now = Instant::now();

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        // Reset window if expired
        if now.duration_since(entry.1) > self.config.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= self.config.requests_per_window {
            return (false, 0, reset_secs);
        }

        entry.0 += 1;
        (true, self.config.requests_per_window - entry.0, reset_secs)
    }

    /// Drop clients idle for two windows; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests.retain(|_, (_, timestamp)| {
            now.duration_since(*timestamp) < self.config.window_duration * 2
        });
        before.saturating_sub(self.requests.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Periodic limiter cleanup, every 60 seconds
pub fn start_cleanup_task(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = state.rate_limiter.cleanup();
            if removed > 0 {
                info!("🧹 Rate limiter cleanup: {} idle clients removed", removed);
            }
        }
    })
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    // Skip rate limiting for health check
    if request.uri().path() == "/health" || request.uri().path() == "/v1/health" {
        return next.run(request).await;
    }

    // Client key: forwarded IP, else a shared bucket
    let rate_key = headers
        .get("X-Forwarded-For")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (allowed, remaining, reset) = state.rate_limiter.check(&rate_key);

    if !allowed {
        warn!(key = %rate_key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::error(ApiError::rate_limited(reset), 0.0)),
        )
            .into_response();
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Remaining", remaining.into());
    headers.insert("X-RateLimit-Reset", reset.into());

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "Request completed"
    );

    response
}
