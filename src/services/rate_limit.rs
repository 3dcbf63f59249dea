use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tower::{Layer, Service};

use crate::modules::auth::interface::AuthError;

pub type IpRateLimiter = Arc<DefaultKeyedRateLimiter<IpAddr>>;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed per client IP within `window`.
    pub max_requests: u32,
    pub window: Duration,
    /// Take the client IP from `X-Forwarded-For`. Only safe behind a proxy
    /// that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            trust_forwarded_for: false,
        }
    }
}

pub fn create_rate_limiter(config: &RateLimitConfig) -> IpRateLimiter {
    // `max_requests` up front, then one slot back per full window. Any span
    // shorter than `window` never admits more than `max_requests`.
    let max = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(config.window)
        .unwrap_or_else(|| Quota::per_second(max))
        .allow_burst(max);
    Arc::new(RateLimiter::keyed(quota))
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: IpRateLimiter,
    trust_forwarded_for: bool,
}

impl RateLimitLayer {
    pub fn new(limiter: IpRateLimiter, trust_forwarded_for: bool) -> Self {
        Self {
            limiter,
            trust_forwarded_for,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: IpRateLimiter,
    trust_forwarded_for: bool,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let client_ip = client_ip(&request, self.trust_forwarded_for);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if limiter.check_key(&client_ip).is_err() {
                tracing::warn!(%client_ip, "auth rate limit exceeded");
                return Ok(AuthError::RateLimited.into_response());
            }
            inner.call(request).await
        })
    }
}

/// Best-effort client address. Requests without connection info (in-process
/// test servers) share the unspecified address bucket.
pub fn client_ip<B>(request: &Request<B>, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            // The proxy appends the address it saw; anything left of it is client-supplied
            .and_then(|v| v.rsplit(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
