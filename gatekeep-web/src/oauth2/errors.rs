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
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gatekeep_core::GrantError;
use serde::{Deserialize, Serialize};

/// OAuth2 error response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthError {
    fn with_code(error: &str, description: &str) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.to_string()),
            error_uri: None,
        }
    }

    pub fn invalid_request(description: &str) -> Self {
        Self::with_code("invalid_request", description)
    }

    pub fn invalid_client(description: &str) -> Self {
        Self::with_code("invalid_client", description)
    }

    pub fn invalid_grant(description: &str) -> Self {
        Self::with_code("invalid_grant", description)
    }

    pub fn unsupported_grant_type(description: &str) -> Self {
        Self::with_code("unsupported_grant_type", description)
    }

    pub fn server_error(description: &str) -> Self {
        Self::with_code("server_error", description)
    }
}

/// OAuth error response wrapper
#[derive(Debug)]
pub struct OAuthErrorResponse(pub OAuthError);

impl IntoResponse for OAuthErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.0.error.as_str() {
            "invalid_request" => StatusCode::BAD_REQUEST,
            "invalid_client" => StatusCode::UNAUTHORIZED,
            "invalid_grant" => StatusCode::BAD_REQUEST,
            "unsupported_grant_type" => StatusCode::BAD_REQUEST,
            "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        let mut response = (status, Json(self.0)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        // Client authentication at the token endpoint is HTTP Basic
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"gatekeep\""),
            );
        }

        response
    }
}

impl From<GrantError> for OAuthErrorResponse {
    fn from(err: GrantError) -> Self {
        let error = match &err {
            GrantError::Unauthorized => OAuthError::invalid_client("Invalid client credentials"),
            GrantError::InvalidCode | GrantError::Expired => {
                OAuthError::invalid_grant(&err.to_string())
            }
            GrantError::UnsupportedGrantType(_) => {
                OAuthError::unsupported_grant_type(&err.to_string())
            }
            GrantError::Internal(e) => {
                tracing::error!(error = ?e, "Token endpoint failed");
                OAuthError::server_error("Internal server error")
            }
            _ => OAuthError::invalid_request(&err.to_string()),
        };
        OAuthErrorResponse(error)
    }
}
