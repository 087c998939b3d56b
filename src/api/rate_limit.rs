//! Per-IP rate limiting for credential and claim actions.
//!
//! Each (IP, tier) pair has a token bucket that refills continuously over the
//! window and resets completely once a full window has passed.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::AppState;

use super::audit::extract_client_ip;
use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// POST /login, POST /signup
    Auth,
    /// Claim submission and decisions
    Action,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: u32,
    window_start: Instant,
    last_request: Instant,
}

impl Bucket {
    fn full(max_tokens: u32, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            window_start: now,
            last_request: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    /// Seconds until the window resets
    pub reset_after: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RateLimitTier), Bucket>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            window: Duration::from_secs(config.window_seconds),
            config,
        }
    }

    pub fn limit_for(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Auth => self.config.auth_requests_per_window,
            RateLimitTier::Action => self.config.action_requests_per_window,
        }
    }

    /// Take a token. `Err` carries the retry-after in seconds.
    pub fn check(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        let limit = self.limit_for(tier);
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                remaining: limit,
                limit,
                reset_after: 0,
            });
        }

        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry((ip, tier))
            .or_insert_with(|| Bucket::full(limit, now));

        let elapsed = now.duration_since(bucket.window_start);
        if elapsed >= self.window {
            *bucket = Bucket::full(limit, now);
        } else {
            let since_last = now.duration_since(bucket.last_request).as_secs_f64();
            let per_second = limit as f64 / self.window.as_secs_f64().max(1.0);
            let refill = (since_last * per_second) as u32;
            bucket.tokens = bucket.tokens.saturating_add(refill).min(limit);
        }
        bucket.last_request = now;

        let reset_after = self
            .window
            .saturating_sub(now.duration_since(bucket.window_start))
            .as_secs();
        if bucket.tokens == 0 {
            return Err(reset_after.max(1));
        }

        bucket.tokens -= 1;
        Ok(RateLimitInfo {
            remaining: bucket.tokens,
            limit,
            reset_after,
        })
    }

    /// Drop buckets idle for two windows
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let expiry = self.window * 2;
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_request) < expiry);
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Bucket key for a request: the socket peer, or the forwarded client
/// address when proxy headers are trusted
fn client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> IpAddr {
    let forwarded = trust_proxy_headers
        .then(|| extract_client_ip(request.headers()))
        .flatten()
        .and_then(|ip| ip.parse().ok());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(&state, request, next, RateLimitTier::Auth).await
}

pub async fn rate_limit_action(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    rate_limit_with_tier(&state, request, next, RateLimitTier::Action).await
}

async fn rate_limit_with_tier(
    state: &AppState,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    let ip = client_ip(&request, state.config.server.trust_proxy_headers);

    match state.rate_limiter.check(ip, tier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_after));
            response
        }
        Err(retry_after) => {
            tracing::warn!(%ip, ?tier, retry_after, "Rate limit exceeded");
            let mut response = ApiError::rate_limited(format!(
                "Too many requests. Try again in {} seconds.",
                retry_after
            ))
            .into_response();
            let headers = response.headers_mut();
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            headers.insert("X-RateLimit-Limit", HeaderValue::from(state.rate_limiter.limit_for(tier)));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
            response
        }
    }
}

pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            auth_requests_per_window: 3,
            action_requests_per_window: 10,
            window_seconds: 60,
            cleanup_interval: 300,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/login");
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        request
    }

    #[test]
    fn test_key_ignores_forwarded_header_by_default() {
        let request = request_from("198.51.100.4:50000", Some("203.0.113.9"));
        assert_eq!(client_ip(&request, false), ip("198.51.100.4"));
        assert_eq!(client_ip(&request, true), ip("203.0.113.9"));

        // Rotating the header does not change the bucket
        let rotated = request_from("198.51.100.4:50001", Some("203.0.113.10"));
        assert_eq!(client_ip(&rotated, false), client_ip(&request, false));
    }

    #[test]
    fn test_key_falls_back_without_peer() {
        let request = Request::builder().uri("/login").body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request, false), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new(test_config());
        for i in 0..3 {
            assert!(
                limiter.check(ip("192.168.1.1"), RateLimitTier::Auth).is_ok(),
                "attempt {} should be allowed",
                i
            );
        }
        let retry = limiter
            .check(ip("192.168.1.1"), RateLimitTier::Auth)
            .unwrap_err();
        assert!(retry >= 1);
    }

    #[test]
    fn test_ips_and_tiers_are_independent() {
        let limiter = RateLimiter::new(test_config());
        for _ in 0..3 {
            let _ = limiter.check(ip("192.168.1.1"), RateLimitTier::Auth);
        }
        assert!(limiter.check(ip("192.168.1.1"), RateLimitTier::Auth).is_err());
        assert!(limiter.check(ip("192.168.1.2"), RateLimitTier::Auth).is_ok());
        assert!(limiter.check(ip("192.168.1.1"), RateLimitTier::Action).is_ok());
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = RateLimiter::new(test_config());
        let first = limiter.check(ip("10.0.0.1"), RateLimitTier::Auth).unwrap();
        let second = limiter.check(ip("10.0.0.1"), RateLimitTier::Auth).unwrap();
        assert_eq!(first.limit, 3);
        assert_eq!(first.remaining, 2);
        assert_eq!(second.remaining, 1);
    }

    #[test]
    fn test_disabled_never_blocks() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);
        for _ in 0..100 {
            assert!(limiter.check(ip("192.168.1.1"), RateLimitTier::Auth).is_ok());
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new(test_config());
        let _ = limiter.check(ip("192.168.1.1"), RateLimitTier::Action);
        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }
}
