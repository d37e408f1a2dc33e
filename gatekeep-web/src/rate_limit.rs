// Gatekeep - An OAuth2 authorization server built with Rust
// Copyright (C) 2025 Gatekeep Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

/// Login attempts counted per client IP
pub type SharedRateLimiter = Arc<DefaultKeyedRateLimiter<IpAddr>>;

/// Path of the credential check guarded by the login limiter
pub const LOGIN_PATH: &str = "/oauth/login";

/// Create a rate limiter for login attempts, one bucket per client IP
pub fn create_login_rate_limiter(max_attempts: u32) -> SharedRateLimiter {
    // Zero would mean "never", fall back to one attempt per minute
    let quota = Quota::per_minute(NonZeroU32::new(max_attempts).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// Peer address of the connection. Requests served without connection info
/// share one bucket.
fn client_ip(request: &Request<Body>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting for credential submissions
pub async fn login_rate_limit_middleware(
    State(limiter): State<SharedRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.method() == Method::POST && request.uri().path() == LOGIN_PATH {
        let ip = client_ip(&request);
        match limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(_) => {
                tracing::warn!(client_ip = %ip, "Rate limit exceeded for login");
                Err(StatusCode::TOO_MANY_REQUESTS)
            }
        }
    } else {
        Ok(next.run(request).await)
    }
}
