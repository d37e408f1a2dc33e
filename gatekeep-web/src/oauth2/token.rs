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
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::errors::{OAuthError, OAuthErrorResponse};
use crate::{error::AppError, AppState};

/// Token request. Other fields a client sends, `redirect_uri` among them,
/// are accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// What a resource server learns about a bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub client: Uuid,
    pub account: Uuid,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /oauth/token
pub async fn token_handler(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    Form(request): Form<TokenRequest>,
) -> Result<Response, OAuthErrorResponse> {
    let (client_id, client_secret) = extract_client_credentials(auth_header, &request)?;

    let grant_type = request
        .grant_type
        .as_deref()
        .ok_or_else(|| OAuthErrorResponse(OAuthError::invalid_request("grant_type is required")))?;
    let code = request
        .code
        .as_deref()
        .ok_or_else(|| OAuthErrorResponse(OAuthError::invalid_request("code is required")))?;

    let pair = state
        .engine
        .exchange_code(&client_id, &client_secret, grant_type, code)
        .await?;

    info!(client = %client_id, "Issued tokens at token endpoint");

    let body = TokenResponse {
        expires_in: pair.access.expires_in(),
        scope: pair.access.scope.join(" "),
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
        token_type: "Bearer".to_string(),
    };

    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    Ok(response)
}

/// GET /oauth/validate/{token}
pub async fn validate_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TokenInfo>, AppError> {
    let access = state.engine.validate_access_token(&token).await?;

    Ok(Json(TokenInfo {
        client: access.client_uuid,
        account: access.account_uuid,
        scope: access.scope.join(" "),
        expires_at: access.expires_at,
    }))
}

/// Credentials from HTTP Basic, falling back to the form body.
fn extract_client_credentials(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    request: &TokenRequest,
) -> Result<(String, String), OAuthErrorResponse> {
    if let Some(TypedHeader(auth)) = auth_header {
        Ok((auth.username().to_string(), auth.password().to_string()))
    } else if let Some(client_id) = &request.client_id {
        Ok((
            client_id.clone(),
            request.client_secret.clone().unwrap_or_default(),
        ))
    } else {
        Err(OAuthErrorResponse(OAuthError::invalid_client(
            "Client authentication required",
        )))
    }
}
