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
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
    Router,
};
use axum_extra::headers::{Authorization, Header};
use pretty_assertions::assert_eq;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use tower::ServiceExt;

use super::errors::OAuthError;
use super::token::{TokenInfo, TokenResponse};
use crate::rate_limit::create_login_rate_limiter;
use crate::routes::create_router;
use crate::test_helpers::{create_test_app_state, seed, CALLBACK, CLIENT_SECRET};

async fn create_test_app(pool: &SqlitePool) -> anyhow::Result<Router> {
    seed(pool).await?;
    Ok(create_router(create_test_app_state(pool.clone())?))
}

async fn get(app: &Router, uri: &str) -> anyhow::Result<Response> {
    Ok(app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?)
}

async fn post_form(
    app: &Router,
    uri: &str,
    fields: &[(&str, &str)],
    authorization: Option<HeaderValue>,
) -> anyhow::Result<Response> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }

    let body = serde_urlencoded::to_string(fields)?;
    Ok(app.clone().oneshot(builder.body(Body::from(body))?).await?)
}

async fn body_string(response: Response) -> anyhow::Result<String> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn basic_auth(user: &str, password: &str) -> HeaderValue {
    let mut values = Vec::new();
    Authorization::basic(user, password).encode(&mut values);
    values.remove(0)
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn query_param(location: &str, key: &str) -> Option<String> {
    let url = url::Url::parse("http://localhost").ok()?.join(location).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn authorize_uri(response_type: &str, scope: &str) -> String {
    let query = serde_urlencoded::to_string([
        ("response_type", response_type),
        ("client_id", "gin"),
        ("redirect_uri", CALLBACK),
        ("state", "xyz"),
        ("scope", scope),
    ])
    .unwrap();
    format!("/oauth/authorize?{}", query)
}

/// Run authorize and return the request id from the login page redirect.
async fn start_flow(app: &Router, response_type: &str, scope: &str) -> anyhow::Result<String> {
    let response = get(app, &authorize_uri(response_type, scope)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with("/oauth/login_page?"));
    Ok(query_param(&location, "request_id").unwrap())
}

async fn login_alice(app: &Router, request_id: &str) -> anyhow::Result<Response> {
    post_form(
        app,
        "/oauth/login",
        &[
            ("request_id", request_id),
            ("login", "alice"),
            ("password", "wonderland"),
        ],
        None,
    )
    .await
}

async fn approve(app: &Router, request_id: &str, scope: &[&str]) -> anyhow::Result<Response> {
    let mut fields = vec![("request_id", request_id)];
    fields.extend(scope.iter().map(|s| ("scope", *s)));
    post_form(app, "/oauth/approve", &fields, None).await
}

async fn exchange(app: &Router, code: &str, secret: &str) -> anyhow::Result<Response> {
    post_form(
        app,
        "/oauth/token",
        &[("grant_type", "authorization_code"), ("code", code)],
        Some(basic_auth("gin", secret)),
    )
    .await
}

/// Authorize, log in and consent to `read`; returns the redirect to the client.
async fn code_redirect(app: &Router) -> anyhow::Result<String> {
    let request_id = start_flow(app, "code", "read").await?;
    let response = login_alice(app, &request_id).await?;
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = approve(app, &request_id, &["read"]).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    Ok(location(&response))
}

#[sqlx::test(migrations = "../migrations")]
async fn test_authorize_redirects_to_login_page(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;

    let response = get(&app, &authorize_uri("code", "read write")).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert!(query_param(&location(&response), "request_id").is_some());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grant_requests")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_authorize_rejects_bad_requests(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;

    let cases = [
        "/oauth/authorize?response_type=code&client_id=gin&redirect_uri=http%3A%2F%2Fevil.example%2Fcb&state=xyz&scope=read",
        "/oauth/authorize?response_type=code&client_id=tonic&redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback&scope=read",
        "/oauth/authorize?response_type=code&client_id=gin&redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback&scope=admin",
        "/oauth/authorize?response_type=password&client_id=gin&redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback&scope=read",
        "/oauth/authorize?client_id=gin&redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback&scope=read",
    ];

    for uri in cases {
        let response = get(&app, uri).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_login_page_for_unknown_request(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;

    let response = get(&app, "/oauth/login_page?request_id=nope").await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_login_page_renders_form(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let request_id = start_flow(&app, "code", "read").await?;

    let response = get(&app, &format!("/oauth/login_page?request_id={}", request_id)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    let html = body_string(response).await?;
    assert!(html.contains(&format!("value=\"{}\"", request_id)));
    assert!(html.contains("<strong>gin</strong>"));
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_failed_login_points_back_to_login_page(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let request_id = start_flow(&app, "code", "read").await?;

    let response = post_form(
        &app,
        "/oauth/login",
        &[
            ("request_id", request_id.as_str()),
            ("login", "alice"),
            ("password", "looking-glass"),
        ],
        None,
    )
    .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        location(&response),
        format!("/oauth/login_page?request_id={}", request_id)
    );
    let html = body_string(response).await?;
    assert!(html.contains("Invalid login or password"));
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_unknown_login_looks_like_wrong_password(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let request_id = start_flow(&app, "code", "read").await?;

    let response = post_form(
        &app,
        "/oauth/login",
        &[
            ("request_id", request_id.as_str()),
            ("login", "mallory"),
            ("password", "wonderland"),
        ],
        None,
    )
    .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_code_flow_end_to_end(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let request_id = start_flow(&app, "code", "read write").await?;

    // First login has nothing approved yet
    let response = login_alice(&app, &request_id).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        format!("/oauth/approve_page?request_id={}", request_id)
    );

    let response = get(&app, &location(&response)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await?;
    assert!(html.contains("Read your account information"));
    assert!(html.contains("Modify your account information"));

    let response = approve(&app, &request_id, &["read", "write"]).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    let redirect = location(&response);
    assert!(redirect.starts_with(CALLBACK));
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("xyz"));
    assert_eq!(query_param(&redirect, "scope").as_deref(), Some("read,write"));
    let code = query_param(&redirect, "code").unwrap();

    let response = exchange(&app, &code, CLIENT_SECRET).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-cache");
    let tokens: TokenResponse = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.scope, "read write");
    assert!(tokens.expires_in > 0);
    assert_ne!(tokens.access_token, tokens.refresh_token);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grant_requests")
        .fetch_one(&pool)
        .await?;
    assert_eq!(remaining, 0);

    let response = get(&app, &format!("/oauth/validate/{}", tokens.access_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let info: TokenInfo = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(info.scope, "read write");
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_code_cannot_be_exchanged_twice(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let code = query_param(&code_redirect(&app).await?, "code").unwrap();

    let first = exchange(&app, &code, CLIENT_SECRET).await?;
    assert_eq!(first.status(), StatusCode::OK);

    let second = exchange(&app, &code, CLIENT_SECRET).await?;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let error: OAuthError = serde_json::from_str(&body_string(second).await?)?;
    assert_eq!(error.error, "invalid_grant");
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_second_flow_is_approved_without_consent(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    code_redirect(&app).await?;

    let request_id = start_flow(&app, "code", "read").await?;
    let response = login_alice(&app, &request_id).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let redirect = location(&response);
    assert!(redirect.starts_with(CALLBACK));
    assert!(query_param(&redirect, "code").is_some());
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_denied_consent_redirects_with_access_denied(
    pool: SqlitePool,
) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let request_id = start_flow(&app, "code", "read").await?;
    login_alice(&app, &request_id).await?;

    let response = approve(&app, &request_id, &[]).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let redirect = location(&response);
    assert!(redirect.starts_with(CALLBACK));
    assert_eq!(query_param(&redirect, "error").as_deref(), Some("access_denied"));
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("xyz"));

    let response = get(&app, &format!("/oauth/approve_page?request_id={}", request_id)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_implicit_flow_returns_token_in_redirect(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let request_id = start_flow(&app, "token", "read").await?;
    login_alice(&app, &request_id).await?;

    let response = approve(&app, &request_id, &["read"]).await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let redirect = location(&response);
    assert_eq!(query_param(&redirect, "token_type").as_deref(), Some("bearer"));
    assert_eq!(query_param(&redirect, "scope").as_deref(), Some("read"));
    let token = query_param(&redirect, "access_token").unwrap();

    let response = get(&app, &format!("/oauth/validate/{}", token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_token_endpoint_rejects_bad_client_secret(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let code = query_param(&code_redirect(&app).await?, "code").unwrap();

    let response = exchange(&app, &code, "not-the-secret").await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_some());
    let error: OAuthError = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(error.error, "invalid_client");

    // The code survives a failed authentication
    let response = exchange(&app, &code, CLIENT_SECRET).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_token_endpoint_accepts_form_credentials(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;
    let code = query_param(&code_redirect(&app).await?, "code").unwrap();

    let response = post_form(
        &app,
        "/oauth/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", "gin"),
            ("client_secret", CLIENT_SECRET),
        ],
        None,
    )
    .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_token_endpoint_rejects_other_grant_types(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;

    let response = post_form(
        &app,
        "/oauth/token",
        &[("grant_type", "password"), ("code", "whatever")],
        Some(basic_auth("gin", CLIENT_SECRET)),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: OAuthError = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(error.error, "unsupported_grant_type");
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_token_endpoint_requires_code(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;

    let response = post_form(
        &app,
        "/oauth/token",
        &[("grant_type", "authorization_code")],
        Some(basic_auth("gin", CLIENT_SECRET)),
    )
    .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: OAuthError = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(error.error, "invalid_request");
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_validate_unknown_token(pool: SqlitePool) -> anyhow::Result<()> {
    let app = create_test_app(&pool).await?;

    let response = get(&app, "/oauth/validate/not-a-token").await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn test_login_is_rate_limited(pool: SqlitePool) -> anyhow::Result<()> {
    seed(&pool).await?;
    let mut state = create_test_app_state(pool)?;
    state.login_rate_limiter = create_login_rate_limiter(1);
    let app = create_router(state);
    let request_id = start_flow(&app, "code", "read").await?;

    let first = login_alice(&app, &request_id).await?;
    assert_eq!(first.status(), StatusCode::FOUND);

    let second = login_alice(&app, &request_id).await?;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other endpoints are not limited
    let response = get(&app, &format!("/oauth/approve_page?request_id={}", request_id)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

async fn login_from(
    app: &Router,
    peer: &str,
    request_id: &str,
    password: &str,
) -> anyhow::Result<Response> {
    let body = serde_urlencoded::to_string([
        ("request_id", request_id),
        ("login", "alice"),
        ("password", password),
    ])?;
    let mut request = Request::builder()
        .uri("/oauth/login")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))?;
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>()?));
    Ok(app.clone().oneshot(request).await?)
}

#[sqlx::test(migrations = "../migrations")]
async fn test_login_limit_is_per_client_address(pool: SqlitePool) -> anyhow::Result<()> {
    seed(&pool).await?;
    let mut state = create_test_app_state(pool)?;
    state.login_rate_limiter = create_login_rate_limiter(1);
    let app = create_router(state);
    let request_id = start_flow(&app, "code", "read").await?;

    login_from(&app, "203.0.113.9:40000", &request_id, "guess-1").await?;
    let blocked = login_from(&app, "203.0.113.9:40001", &request_id, "guess-2").await?;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = login_from(&app, "198.51.100.4:50000", &request_id, "wonderland").await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    Ok(())
}
