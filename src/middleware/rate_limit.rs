//! Per-client fixed-window rate limiting for `/api/*`
//!
//! Clients are keyed by IP address. The address comes from the connection
//! (`ConnectInfo`); `X-Forwarded-For` is honored only when the direct peer is
//! a loopback proxy or when no connection info is available.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// Only paths under this prefix are limited
pub const LIMITED_PREFIX: &str = "/api/";

/// Prune expired windows once the table grows past this many clients
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Shared fixed-window counter table
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
    window: Duration,
    max_requests: u32,
    exempt_loopback: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            window: config.window(),
            max_requests: config.max_requests,
            exempt_loopback: config.exempt_loopback,
        }
    }

    /// Count one request from `client` at `now`
    ///
    /// Returns the seconds until the window resets when the client is over
    /// its limit.
    pub fn check(&self, client: IpAddr, now: Instant) -> Result<(), u64> {
        if self.exempt_loopback && client.is_loopback() {
            return Ok(());
        }

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            return Err(remaining.as_secs_f64().ceil().max(1.0) as u64);
        }

        entry.count += 1;
        Ok(())
    }

    /// Number of clients with an open window
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .map(|w| w.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

/// Rate limit middleware; paths outside [`LIMITED_PREFIX`] pass through
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !request.uri().path().starts_with(LIMITED_PREFIX) {
        return Ok(next.run(request).await);
    }

    let client = client_ip(&request);
    if let Err(retry_after_seconds) = limiter.check(client, Instant::now()) {
        tracing::warn!(
            client = %client,
            path = %request.uri().path(),
            retry_after_seconds,
            "Client rate limit exceeded"
        );
        return Err(AppError::ClientRateLimited {
            retry_after_seconds,
        });
    }

    Ok(next.run(request).await)
}

/// Resolve the client address used as the limiter key
fn client_ip(request: &Request) -> IpAddr {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let trust_forwarded = peer.is_none_or(|ip| ip.is_loopback());
    if trust_forwarded {
        if let Some(forwarded) = forwarded_for(request) {
            return forwarded;
        }
    }

    peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn forwarded_for(request: &Request) -> Option<IpAddr> {
    request
        .headers()
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
