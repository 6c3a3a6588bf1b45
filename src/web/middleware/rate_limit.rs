//! Rate limiting middleware.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Length of one rate limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Per-IP rate limiter using Governor, keyed by client IP.
pub type IpRateLimiter = DefaultKeyedRateLimiter<String>;

/// How often idle client entries are purged.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Which limiter a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitClass {
    /// Not rate limited.
    Exempt,
    /// General API requests.
    Api,
    /// Uploads and per-file operations.
    Upload,
}

impl LimitClass {
    /// Classify a request path.
    pub fn for_path(path: &str) -> Self {
        let Some(api_path) = path.strip_prefix("/api") else {
            return LimitClass::Exempt;
        };
        if api_path == "/health" {
            LimitClass::Exempt
        } else if api_path == "/upload" || api_path.starts_with("/files/") {
            LimitClass::Upload
        } else {
            LimitClass::Api
        }
    }
}

/// State for rate limiting.
pub struct RateLimitState {
    /// Per-IP limiter for the general API.
    api: IpRateLimiter,
    /// Per-IP limiter for uploads and file operations.
    upload: IpRateLimiter,
}

impl RateLimitState {
    /// Create a new rate limit state (limits are requests per 15 minutes).
    pub fn new(api_rate_limit: u32, upload_rate_limit: u32) -> Self {
        Self {
            api: RateLimiter::keyed(Self::quota(api_rate_limit)),
            upload: RateLimiter::keyed(Self::quota(upload_rate_limit)),
        }
    }

    fn quota(requests_per_window: u32) -> Quota {
        let burst = NonZeroU32::new(requests_per_window).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(RATE_LIMIT_WINDOW / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }

    /// Check if a request is allowed. Exempt requests always are.
    pub fn check(&self, class: LimitClass, ip: &str) -> bool {
        let limiter = match class {
            LimitClass::Exempt => return true,
            LimitClass::Api => &self.api,
            LimitClass::Upload => &self.upload,
        };
        limiter.check_key(&ip.to_string()).is_ok()
    }

    /// Number of clients currently tracked across both limiters.
    pub fn tracked_clients(&self) -> usize {
        self.api.len() + self.upload.len()
    }

    /// Drop clients whose bucket has fully refilled (call periodically).
    ///
    /// A client that still has spent quota keeps its state.
    pub fn cleanup(&self) {
        for limiter in [&self.api, &self.upload] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                self.cleanup();
                tracing::debug!(clients = self.tracked_clients(), "Purged idle rate limiters");
            }
        });
    }
}

/// Extract client IP from request.
fn get_client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next() {
            return ip.trim().to_string();
        }
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for all API routes.
pub async fn rate_limit(state: Arc<RateLimitState>, req: Request<Body>, next: Next) -> Response {
    let class = LimitClass::for_path(req.uri().path());
    if class == LimitClass::Exempt {
        return next.run(req).await;
    }

    let ip = get_client_ip(&req);
    if !state.check(class, &ip) {
        tracing::warn!(ip = %ip, class = ?class, "Rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }

    next.run(req).await
}
