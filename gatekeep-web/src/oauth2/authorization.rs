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
    extract::{Query, RawQuery, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use gatekeep_core::{FlowStep, GrantError};
use serde::Deserialize;
use tera::Context;
use tracing::debug;

use super::{no_store, page_url, redirect, FlowParams};
use crate::{error::AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct RequestIdQuery {
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub request_id: String,
    pub login: String,
    pub password: String,
}

/// GET /oauth/authorize
///
/// Validates the client's request, stores it and sends the browser to the
/// login page.
pub async fn authorize_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = FlowParams::from_query(query.as_deref())?;

    let request = state
        .engine
        .authorize(
            params.require("client_id")?,
            params.require("response_type")?,
            params.require("redirect_uri")?,
            params.get("state").unwrap_or_default(),
            params.scope(),
        )
        .await?;

    Ok(redirect(page_url("login_page", &request.token)))
}

/// GET /oauth/login_page
pub async fn login_page_handler(
    State(state): State<AppState>,
    Query(query): Query<RequestIdQuery>,
) -> Result<Response, AppError> {
    let html = render_login(&state, &query.request_id, None).await?;
    Ok(no_store(html.into_response()))
}

/// POST /oauth/login
pub async fn login_handler(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match state
        .engine
        .login(&form.request_id, &form.login, &form.password)
        .await
    {
        Ok(step) => flow_step_response(step),
        Err(GrantError::Unauthorized) => {
            let html =
                render_login(&state, &form.request_id, Some("Invalid login or password")).await?;
            let mut response = (StatusCode::UNAUTHORIZED, html).into_response();
            if let Ok(location) = page_url("login_page", &form.request_id).parse() {
                response.headers_mut().insert(header::LOCATION, location);
            }
            Ok(no_store(response))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /oauth/approve_page
pub async fn approve_page_handler(
    State(state): State<AppState>,
    Query(query): Query<RequestIdQuery>,
) -> Result<Response, AppError> {
    let details = state.engine.consent_details(&query.request_id).await?;

    let mut context = Context::new();
    context.insert("client_name", &details.client_name);
    context.insert("request_id", &details.request_token);
    context.insert("scope", &details.scope);

    let html = render(&state, "approve.html", &context)?;
    Ok(no_store(html.into_response()))
}

/// POST /oauth/approve
///
/// The form carries one `scope` field per ticked box; submitting none of
/// them denies the request.
pub async fn approve_handler(
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let params = FlowParams::from(pairs);
    let consented = params.scope();

    debug!(scope = %consented, "Consent submitted");
    let step = state
        .engine
        .approve(params.require("request_id")?, consented)
        .await?;

    flow_step_response(step)
}

fn flow_step_response(step: FlowStep) -> Result<Response, AppError> {
    let location = match step {
        FlowStep::NeedsConsent { request_token } => page_url("approve_page", &request_token),
        FlowStep::Completed(completion) => completion.redirect_url()?,
        FlowStep::Denied(denial) => denial.redirect_url()?,
    };
    Ok(redirect(location))
}

async fn render_login(
    state: &AppState,
    request_id: &str,
    error: Option<&str>,
) -> Result<Html<String>, AppError> {
    let details = state.engine.consent_details(request_id).await?;

    let mut context = Context::new();
    context.insert("client_name", &details.client_name);
    context.insert("request_id", &details.request_token);
    if let Some(error) = error {
        context.insert("error", error);
    }

    render(state, "login.html", &context)
}

fn render(state: &AppState, template: &str, context: &Context) -> Result<Html<String>, AppError> {
    state.templates.render(template, context).map(Html).map_err(|e| {
        AppError::internal_server_error("Internal server error")
            .with_details(format!("Failed to render {}: {:?}", template, e))
    })
}
