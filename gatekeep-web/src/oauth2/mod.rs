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

//! HTTP binding of the grant flow: the authorize redirect, the login and
//! approve pages, the token endpoint and token validation.

pub mod authorization;
pub mod errors;
pub mod token;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use gatekeep_core::ScopeSet;

use crate::error::AppError;

/// Decoded form or query parameters, in order, with repeats kept.
#[derive(Debug, Default)]
pub struct FlowParams(Vec<(String, String)>);

impl FlowParams {
    pub fn from_query(query: Option<&str>) -> Result<Self, AppError> {
        let pairs = serde_urlencoded::from_str(query.unwrap_or(""))
            .map_err(|e| AppError::bad_request("Malformed query string").with_details(e.to_string()))?;
        Ok(Self(pairs))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, AppError> {
        self.get(key)
            .ok_or_else(|| AppError::bad_request(format!("Missing parameter '{}'", key)))
    }

    /// Every `scope` value, each split on spaces and commas.
    pub fn scope(&self) -> ScopeSet {
        let values: Vec<&str> = self
            .0
            .iter()
            .filter(|(k, _)| k == "scope")
            .map(|(_, v)| v.as_str())
            .collect();
        ScopeSet::parse(&values.join(" "))
    }
}

impl From<Vec<(String, String)>> for FlowParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

/// `302 Found` that no cache may keep.
pub fn redirect(location: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}

/// Mark a page of the flow as uncacheable.
pub fn no_store(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

/// `/oauth/<page>?request_id=<token>`
pub fn page_url(page: &str, request_id: &str) -> String {
    let query = serde_urlencoded::to_string([("request_id", request_id)]).unwrap_or_default();
    format!("/oauth/{}?{}", page, query)
}
