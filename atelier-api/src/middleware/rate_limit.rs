/// Per-IP throttling for requests that send mail
///
/// Uses an in-process GCRA limiter (`governor`) keyed by client IP. The
/// password-change request is limited to `PASSWORD_CHANGE_PER_HOUR` requests
/// per address and hour (default 3); the quota refills gradually over the hour.
///
/// The client IP comes from `ConnectInfo`, which `main` enables on the
/// listener. Requests without it share a single bucket.
///
/// # Example
///
/// ```no_run
/// use atelier_api::middleware::rate_limit::IpRateLimiter;
/// use std::num::NonZeroU32;
///
/// let limiter = IpRateLimiter::per_hour(NonZeroU32::new(3).unwrap());
/// assert!(limiter.check("192.0.2.1".parse().unwrap()).is_ok());
/// ```

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait before trying again.";

/// Request quota per client address
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl IpRateLimiter {
    pub fn per_hour(requests: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_hour(requests))),
        }
    }

    /// Takes one request from the address's quota
    ///
    /// Returns the whole seconds to wait when the quota is spent.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.limiter.check_key(&ip).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            wait.as_secs().max(1)
        })
    }

    /// Drops state for addresses whose quota is full again
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

/// Peer address of the connection, or `0.0.0.0` when unknown
pub fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rejects password-change requests over the per-IP quota with 429
pub async fn password_change_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&req);

    if let Err(retry_after_secs) = state.password_change_limiter.check(ip) {
        tracing::warn!(client_ip = %ip, retry_after_secs, "password change request throttled");
        return Err(ApiError::TooManyRequests {
            message: RATE_LIMITED_MESSAGE.to_string(),
            retry_after_secs,
        });
    }

    Ok(next.run(req).await)
}
