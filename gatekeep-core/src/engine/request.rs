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
use uuid::Uuid;

use super::{Completion, GrantEngine};
use crate::error::{GrantError, GrantResult};
use crate::models::{Client, GrantRequest, ResponseType};
use crate::ports::WriteOutcome;
use crate::scope::ScopeSet;
use crate::token::redact;

impl GrantEngine {
    /// Validate a client's request and persist it in the `Created` state.
    pub async fn create_grant_request(
        &self,
        client: &Client,
        response_type: &str,
        redirect_uri: &str,
        state: &str,
        scope: ScopeSet,
    ) -> GrantResult<GrantRequest> {
        let response_type: ResponseType = response_type
            .parse()
            .map_err(GrantError::InvalidResponseType)?;

        if !client.has_redirect_uri(redirect_uri) {
            return Err(GrantError::InvalidRedirectUri);
        }

        if scope.is_empty() || !self.catalog.permits(client, &scope) {
            return Err(GrantError::InvalidScope);
        }

        let mut request = GrantRequest::new(
            client.uuid,
            response_type,
            redirect_uri.to_string(),
            state.to_string(),
            scope,
            self.settings.request_lifetime,
        );

        for _ in 0..self.settings.max_token_attempts {
            match self.store.create_grant_request(&request).await? {
                WriteOutcome::Applied => {
                    info!(
                        client = %client.name,
                        response_type = %response_type,
                        scope = %request.scope_requested,
                        "Created grant request"
                    );
                    return Ok(request);
                }
                WriteOutcome::DuplicateKey => {
                    debug!("Grant request token collision, regenerating");
                    request.regenerate_token();
                }
                WriteOutcome::NotFound | WriteOutcome::Conflict => {
                    return Err(GrantError::invariant("insert reported an update outcome"));
                }
            }
        }

        Err(GrantError::invariant(
            "could not generate a unique grant request token",
        ))
    }

    /// Bind the request to the account that just logged in. Attaching the
    /// same account again is a no-op.
    ///
    /// The check runs against the stored row, so of two concurrent logins
    /// with different accounts exactly one wins.
    pub async fn attach_account(
        &self,
        request: &mut GrantRequest,
        account_uuid: Uuid,
    ) -> GrantResult<()> {
        if request.account_uuid.is_some_and(|existing| existing != account_uuid) {
            warn!(request = %redact(&request.token), "Second account tried to claim grant request");
            return Err(GrantError::AccountMismatch);
        }

        match self
            .store
            .attach_grant_request_account(&request.token, account_uuid)
            .await?
        {
            WriteOutcome::Applied => {
                request.account_uuid = Some(account_uuid);
                Ok(())
            }
            WriteOutcome::Conflict => {
                warn!(request = %redact(&request.token), "Second account tried to claim grant request");
                Err(GrantError::AccountMismatch)
            }
            WriteOutcome::NotFound => Err(GrantError::RequestNotFound),
            WriteOutcome::DuplicateKey => Err(GrantError::invariant(
                "attaching an account collided on a unique key",
            )),
        }
    }

    /// Complete an approved request.
    ///
    /// Code grants keep the record and store a one-time code on it; the
    /// record is now the redemption key. Implicit grants delete the record
    /// before minting, so a request can never yield two tokens.
    pub async fn finalize(&self, mut request: GrantRequest) -> GrantResult<Completion> {
        if request.account_uuid.is_none() {
            return Err(GrantError::NotAuthenticated);
        }
        if request.scope_approved.is_empty() {
            return Err(GrantError::invariant(
                "finalizing a grant request without approved scope",
            ));
        }
        if request.code.is_some() {
            return Err(GrantError::AlreadyFinalized);
        }

        match request.response_type {
            ResponseType::Code => {
                for _ in 0..self.settings.max_token_attempts {
                    let code = request.issue_code().to_string();
                    match self
                        .store
                        .set_grant_request_code(&request.token, &code)
                        .await?
                    {
                        WriteOutcome::Applied => {
                            info!(request = %redact(&request.token), "Issued authorization code");
                            return Ok(Completion::Code {
                                redirect_uri: request.redirect_uri,
                                state: request.state,
                                scope: request.scope_approved,
                                code,
                            });
                        }
                        WriteOutcome::DuplicateKey => {
                            debug!("Authorization code collision, regenerating");
                        }
                        WriteOutcome::Conflict => return Err(GrantError::AlreadyFinalized),
                        WriteOutcome::NotFound => return Err(GrantError::RequestNotFound),
                    }
                }

                Err(GrantError::invariant(
                    "could not generate a unique authorization code",
                ))
            }
            ResponseType::Token => {
                if !self.store.delete_grant_request(&request.token).await? {
                    return Err(GrantError::RequestNotFound);
                }

                let token = self.issue_implicit(&request).await?;
                info!(request = %redact(&request.token), "Completed implicit grant");

                Ok(Completion::Implicit {
                    redirect_uri: request.redirect_uri,
                    state: request.state,
                    scope: token.scope.clone(),
                    token,
                })
            }
        }
    }

    /// Fetch a request that has not expired yet.
    pub(crate) async fn load_request(&self, token: &str) -> GrantResult<GrantRequest> {
        let request = self
            .store
            .get_grant_request_by_token(token)
            .await?
            .ok_or(GrantError::RequestNotFound)?;

        // expired between the sweep and the read
        if request.is_expired() {
            return Err(GrantError::RequestNotFound);
        }

        Ok(request)
    }
}
