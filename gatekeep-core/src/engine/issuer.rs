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

use tracing::{debug, info, warn};

use super::{GrantEngine, TokenPair};
use crate::error::{GrantError, GrantResult};
use crate::models::{AccessToken, Client, GrantRequest, RefreshToken, ResponseType};
use crate::ports::WriteOutcome;
use crate::token::redact;

impl GrantEngine {
    /// Mint the access token for an approved implicit grant. No refresh
    /// token is issued on this path.
    pub async fn issue_implicit(&self, request: &GrantRequest) -> GrantResult<AccessToken> {
        if request.response_type != ResponseType::Token {
            return Err(GrantError::invariant(
                "implicit token requested for a code grant",
            ));
        }
        let account_uuid = request.account_uuid.ok_or(GrantError::NotAuthenticated)?;

        let token = AccessToken::new(
            request.client_uuid,
            account_uuid,
            request.scope_approved.clone(),
            self.settings.access_token_lifetime,
        );
        self.store_access_token(token).await
    }

    /// Redeem `code` for an access and refresh token pair.
    ///
    /// The request is consumed before anything is minted, so of several
    /// concurrent callers presenting the same code exactly one gets past the
    /// first step; the rest see `InvalidCode`.
    pub async fn issue_code_exchange(&self, client: &Client, code: &str) -> GrantResult<TokenPair> {
        let request = match self.store.consume_grant_request_by_code(code).await? {
            Some(request) => request,
            None => {
                warn!(code = %redact(code), "Unknown or already redeemed authorization code");
                return Err(GrantError::InvalidCode);
            }
        };

        if request.client_uuid != client.uuid {
            warn!(client = %client.name, "Authorization code presented by another client");
            return Err(GrantError::InvalidCode);
        }

        if request.is_expired() {
            info!(request = %redact(&request.token), "Discarded expired authorization code");
            return Err(GrantError::Expired);
        }

        let account_uuid = request.account_uuid.ok_or_else(|| {
            GrantError::invariant("authorization code issued without an account")
        })?;
        if request.scope_approved.is_empty() {
            return Err(GrantError::invariant(
                "authorization code issued without approved scope",
            ));
        }

        let access = self
            .store_access_token(AccessToken::new(
                request.client_uuid,
                account_uuid,
                request.scope_approved.clone(),
                self.settings.access_token_lifetime,
            ))
            .await?;
        let refresh = self
            .store_refresh_token(RefreshToken::new(
                request.client_uuid,
                account_uuid,
                request.scope_approved,
            ))
            .await?;

        info!(client = %client.name, scope = %access.scope, "Exchanged authorization code");
        Ok(TokenPair { access, refresh })
    }

    async fn store_access_token(&self, mut token: AccessToken) -> GrantResult<AccessToken> {
        for _ in 0..self.settings.max_token_attempts {
            match self.store.create_access_token(&token).await? {
                WriteOutcome::Applied => return Ok(token),
                WriteOutcome::DuplicateKey => {
                    debug!("Access token collision, regenerating");
                    token.regenerate_token();
                }
                WriteOutcome::NotFound | WriteOutcome::Conflict => {
                    return Err(GrantError::invariant("insert reported an update outcome"));
                }
            }
        }

        Err(GrantError::invariant("could not generate a unique access token"))
    }

    async fn store_refresh_token(&self, mut token: RefreshToken) -> GrantResult<RefreshToken> {
        for _ in 0..self.settings.max_token_attempts {
            match self.store.create_refresh_token(&token).await? {
                WriteOutcome::Applied => return Ok(token),
                WriteOutcome::DuplicateKey => {
                    debug!("Refresh token collision, regenerating");
                    token.regenerate_token();
                }
                WriteOutcome::NotFound | WriteOutcome::Conflict => {
                    return Err(GrantError::invariant("insert reported an update outcome"));
                }
            }
        }

        Err(GrantError::invariant("could not generate a unique refresh token"))
    }
}
