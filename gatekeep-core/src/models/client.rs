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

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeSet;
use crate::token::secrets_match;

/// A registered third-party application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub uuid: Uuid,
    /// Public identifier presented as `client_id` on the wire.
    pub name: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub redirect_uris: Vec<String>,
    /// Scope this client may ever request.
    pub scope: ScopeSet,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(
        name: String,
        secret: String,
        redirect_uris: Vec<String>,
        scope: ScopeSet,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            anyhow::bail!("Client name cannot be empty");
        }
        if secret.len() < 8 {
            anyhow::bail!("Client secret must be at least 8 characters");
        }
        for uri in &redirect_uris {
            url::Url::parse(uri).map_err(|e| anyhow::anyhow!("Invalid redirect URI '{}': {}", uri, e))?;
        }

        Ok(Self {
            uuid: Uuid::new_v4(),
            name,
            secret,
            redirect_uris,
            scope,
            created_at: Utc::now(),
        })
    }

    /// Redirect URIs must match a registered one exactly; no prefix or
    /// wildcard matching.
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    pub fn verify_secret(&self, secret: &str) -> bool {
        secrets_match(secret, &self.secret)
    }
}
