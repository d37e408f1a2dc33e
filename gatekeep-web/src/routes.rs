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

use crate::{
    oauth2::{authorization, token},
    rate_limit::login_rate_limit_middleware,
    request_logging::request_logging_middleware,
    AppState,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Browser side of the flow
        .route("/oauth/authorize", get(authorization::authorize_handler))
        .route("/oauth/login_page", get(authorization::login_page_handler))
        .route("/oauth/login", post(authorization::login_handler))
        .route("/oauth/approve_page", get(authorization::approve_page_handler))
        .route("/oauth/approve", post(authorization::approve_handler))
        // Client and resource server side
        .route("/oauth/token", post(token::token_handler))
        .route("/oauth/validate/{token}", get(token::validate_handler))
        .layer(middleware::from_fn_with_state(
            state.login_rate_limiter.clone(),
            login_rate_limit_middleware,
        ))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Health check handler
async fn health() -> &'static str {
    "OK"
}
