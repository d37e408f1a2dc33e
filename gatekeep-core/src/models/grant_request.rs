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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::scope::ScopeSet;
use crate::token::{generate_secure_token, REQUEST_TOKEN_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization code grant.
    Code,
    /// Implicit grant.
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a persisted grant request stands. Requests that completed an
/// implicit grant, were exchanged or were swept no longer exist, so those
/// dispositions have no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    Created,
    Authenticated,
    Approved,
    CodeIssued,
}

/// One authorization attempt, from the authorize call until it is
/// finalized, exchanged or expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrantRequest {
    pub token: String,
    pub client_uuid: Uuid,
    pub response_type: ResponseType,
    pub redirect_uri: String,
    pub state: String,
    pub scope_requested: ScopeSet,
    pub scope_approved: ScopeSet,
    pub account_uuid: Option<Uuid>,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GrantRequest {
    pub fn new(
        client_uuid: Uuid,
        response_type: ResponseType,
        redirect_uri: String,
        state: String,
        scope_requested: ScopeSet,
        lifetime: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            token: generate_secure_token(REQUEST_TOKEN_LENGTH),
            client_uuid,
            response_type,
            redirect_uri,
            state,
            scope_requested,
            scope_approved: ScopeSet::new(),
            account_uuid: None,
            code: None,
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    pub fn state(&self) -> GrantState {
        if self.code.is_some() {
            GrantState::CodeIssued
        } else if !self.scope_approved.is_empty() {
            GrantState::Approved
        } else if self.account_uuid.is_some() {
            GrantState::Authenticated
        } else {
            GrantState::Created
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Replace the request token after a key collision on insert.
    pub fn regenerate_token(&mut self) {
        self.token = generate_secure_token(REQUEST_TOKEN_LENGTH);
    }

    /// Draw a fresh one-time code, guaranteed to differ from the request
    /// token.
    pub fn issue_code(&mut self) -> &str {
        let mut code = generate_secure_token(REQUEST_TOKEN_LENGTH);
        while code == self.token {
            code = generate_secure_token(REQUEST_TOKEN_LENGTH);
        }
        self.code.insert(code).as_str()
    }
}
