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
use uuid::Uuid;

use crate::scope::ScopeSet;
use crate::token::{generate_secure_token, BEARER_TOKEN_LENGTH};

/// OAuth2 access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub client_uuid: Uuid,
    pub account_uuid: Uuid,
    pub scope: ScopeSet,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(client_uuid: Uuid, account_uuid: Uuid, scope: ScopeSet, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: generate_secure_token(BEARER_TOKEN_LENGTH),
            client_uuid,
            account_uuid,
            scope,
            expires_at: now + lifetime,
            created_at: now,
        }
    }

    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }

    /// Seconds until expiry, never negative.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    pub fn regenerate_token(&mut self) {
        self.token = generate_secure_token(BEARER_TOKEN_LENGTH);
    }
}

/// OAuth2 refresh token. Only issued on the authorization code path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshToken {
    pub token: String,
    pub client_uuid: Uuid,
    pub account_uuid: Uuid,
    pub scope: ScopeSet,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(client_uuid: Uuid, account_uuid: Uuid, scope: ScopeSet) -> Self {
        Self {
            token: generate_secure_token(BEARER_TOKEN_LENGTH),
            client_uuid,
            account_uuid,
            scope,
            created_at: Utc::now(),
        }
    }

    pub fn regenerate_token(&mut self) {
        self.token = generate_secure_token(BEARER_TOKEN_LENGTH);
    }
}
