use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::http::HeaderMap;
use governor::{DefaultKeyedRateLimiter, Quota};

use crate::core::errors::ApiError;

/// Per-client request limiter handed to handlers through `AppState`.
///
/// Clients are keyed by peer address. Proxy headers are only read when the
/// server sits behind a trusted reverse proxy. A quota of zero requests per
/// minute disables limiting.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Option<Arc<DefaultKeyedRateLimiter<String>>>,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let Some(per_minute) = NonZeroU32::new(requests_per_minute) else {
            return Self::disabled();
        };
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            inner: Some(Arc::new(governor::RateLimiter::keyed(quota))),
            trust_proxy_headers: false,
        }
    }

    pub fn disabled() -> Self {
        Self {
            inner: None,
            trust_proxy_headers: false,
        }
    }

    /// Keys clients by `x-forwarded-for` / `x-real-ip` instead of the socket
    /// peer. Only safe when every request arrives through a proxy that sets
    /// those headers.
    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn check(&self, client: &str) -> Result<(), ApiError> {
        let Some(limiter) = &self.inner else {
            return Ok(());
        };

        limiter.check_key(&client.to_string()).map_err(|_| {
            tracing::info!("Rate limit exceeded for client {}", client);
            ApiError::RateLimited
        })
    }

    /// Drops state for clients whose buckets have refilled.
    pub fn purge_idle(&self) {
        if let Some(limiter) = &self.inner {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Checks the quota for the client behind `peer`.
    pub fn check_request(&self, headers: &HeaderMap, peer: SocketAddr) -> Result<(), ApiError> {
        self.check(&client_key(headers, peer, self.trust_proxy_headers))
    }
}

/// Peer IP, or with `trust_proxy_headers` the first `x-forwarded-for` hop,
/// then `x-real-ip`, then the peer IP.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr, trust_proxy_headers: bool) -> String {
    if !trust_proxy_headers {
        return peer.ip().to_string();
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
