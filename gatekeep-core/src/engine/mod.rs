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

//! The grant request protocol engine.
//!
//! A flow runs `authorize` → `login` → (`approve`) and, for the code grant,
//! a final `exchange_code` from the client. The engine keeps no state of its
//! own between calls: every step reloads the grant request from the
//! [`OAuthStore`] and every entry point first sweeps expired requests, so a
//! stale request is never acted upon.

mod approval;
mod issuer;
mod request;
mod sweeper;


pub use approval::Approval;

use anyhow::Context;
use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::ScopeCatalog;
use crate::error::{GrantError, GrantResult};
use crate::models::{AccessToken, Client, ClientApproval, GrantRequest, GrantState, RefreshToken};
use crate::ports::{AccountVerifier, OAuthStore};
use crate::scope::ScopeSet;
use crate::token::redact;

/// The only grant type accepted at the token endpoint.
pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

#[derive(Debug, Clone)]
pub struct GrantSettings {
    /// How long a grant request (and its code) stays usable.
    pub request_lifetime: Duration,
    pub access_token_lifetime: Duration,
    /// Attempts at drawing an unused token before giving up.
    pub max_token_attempts: usize,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            request_lifetime: Duration::minutes(15),
            access_token_lifetime: Duration::days(3),
            max_token_attempts: 5,
        }
    }
}

/// What the caller should do after `login` or `approve`.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Show the approve page for this request.
    NeedsConsent { request_token: String },
    /// Redirect back to the client with the grant.
    Completed(Completion),
    /// Redirect back to the client with `error=access_denied`.
    Denied(Denial),
}

/// A finalized grant, ready to be handed back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Code {
        redirect_uri: String,
        state: String,
        scope: ScopeSet,
        code: String,
    },
    Implicit {
        redirect_uri: String,
        state: String,
        scope: ScopeSet,
        token: AccessToken,
    },
}

impl Completion {
    /// The client's redirect URI with the grant appended as query parameters.
    pub fn redirect_url(&self) -> anyhow::Result<String> {
        let (redirect_uri, pairs) = match self {
            Completion::Code {
                redirect_uri,
                state,
                scope,
                code,
            } => (
                redirect_uri,
                vec![
                    ("code", code.clone()),
                    ("state", state.clone()),
                    ("scope", scope.join(",")),
                ],
            ),
            Completion::Implicit {
                redirect_uri,
                state,
                scope,
                token,
            } => (
                redirect_uri,
                vec![
                    ("access_token", token.token.clone()),
                    ("token_type", "bearer".to_string()),
                    ("state", state.clone()),
                    ("scope", scope.join(",")),
                ],
            ),
        };

        append_query(redirect_uri, &pairs)
    }
}

/// The user declined to approve the requested scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    pub redirect_uri: String,
    pub state: String,
}

impl Denial {
    pub fn redirect_url(&self) -> anyhow::Result<String> {
        append_query(
            &self.redirect_uri,
            &[
                ("error", "access_denied".to_string()),
                ("state", self.state.clone()),
            ],
        )
    }
}

fn append_query(base: &str, pairs: &[(&str, String)]) -> anyhow::Result<String> {
    let mut url = url::Url::parse(base).context("Redirect URI is not a valid URL")?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

/// Tokens minted by a successful code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Everything the approve page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentDetails {
    pub client_name: String,
    pub request_token: String,
    pub scope: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct GrantEngine {
    store: Arc<dyn OAuthStore>,
    accounts: Arc<dyn AccountVerifier>,
    catalog: Arc<dyn ScopeCatalog>,
    settings: GrantSettings,
}

impl GrantEngine {
    pub fn new(
        store: Arc<dyn OAuthStore>,
        accounts: Arc<dyn AccountVerifier>,
        catalog: Arc<dyn ScopeCatalog>,
        settings: GrantSettings,
    ) -> Self {
        Self {
            store,
            accounts,
            catalog,
            settings,
        }
    }

    pub fn settings(&self) -> &GrantSettings {
        &self.settings
    }

    /// Start a flow for the client named `client_name`.
    pub async fn authorize(
        &self,
        client_name: &str,
        response_type: &str,
        redirect_uri: &str,
        state: &str,
        scope: ScopeSet,
    ) -> GrantResult<GrantRequest> {
        self.sweep_expired().await?;

        let client = self
            .store
            .get_client_by_name(client_name)
            .await?
            .ok_or_else(|| GrantError::UnknownClient(client_name.to_string()))?;

        self.create_grant_request(&client, response_type, redirect_uri, state, scope)
            .await
    }

    /// Look up a live request, e.g. to render the login page.
    pub async fn pending_request(&self, token: &str) -> GrantResult<GrantRequest> {
        self.sweep_expired().await?;
        self.load_request(token).await
    }

    pub async fn consent_details(&self, token: &str) -> GrantResult<ConsentDetails> {
        let request = self.pending_request(token).await?;
        let client = self.client_of(&request).await?;

        let scope = self
            .catalog
            .describe(&request.scope_requested)
            .ok_or_else(|| {
                error!(scope = %request.scope_requested, "Stored grant request has undescribable scope");
                GrantError::invariant("requested scope has no description")
            })?;

        Ok(ConsentDetails {
            client_name: client.name,
            request_token: request.token,
            scope,
        })
    }

    /// Verify credentials, attach the account and either finish the flow
    /// from prior approvals or ask for consent.
    pub async fn login(&self, token: &str, login: &str, password: &str) -> GrantResult<FlowStep> {
        self.sweep_expired().await?;

        let mut request = self.load_request(token).await?;
        if request.state() == GrantState::CodeIssued {
            return Err(GrantError::AlreadyFinalized);
        }

        let account_uuid = match self.accounts.verify(login, password).await? {
            Some(uuid) => uuid,
            None => {
                warn!(request = %redact(token), "Rejected login for grant request");
                return Err(GrantError::Unauthorized);
            }
        };

        self.attach_account(&mut request, account_uuid).await?;

        match self.approve_scopes(&mut request).await? {
            Approval::Approved => Ok(FlowStep::Completed(self.finalize(request).await?)),
            Approval::NeedsConsent => Ok(FlowStep::NeedsConsent {
                request_token: request.token,
            }),
        }
    }

    /// Record the user's explicit consent and finish the flow.
    ///
    /// An empty consent, or one that leaves part of the request uncovered,
    /// is a denial and ends the request.
    pub async fn approve(&self, token: &str, consented: ScopeSet) -> GrantResult<FlowStep> {
        self.sweep_expired().await?;

        let mut request = self.load_request(token).await?;
        if request.state() == GrantState::CodeIssued {
            return Err(GrantError::AlreadyFinalized);
        }
        let account_uuid = request.account_uuid.ok_or(GrantError::NotAuthenticated)?;

        if !consented.is_subset(&request.scope_requested) {
            return Err(GrantError::ConsentExceedsRequest);
        }

        let prior = ClientApproval::union_of(
            &self
                .store
                .list_client_approvals(request.client_uuid, account_uuid)
                .await?,
        );

        if !consented.is_empty() {
            let approval = ClientApproval::new(request.client_uuid, account_uuid, consented.clone());
            self.store.create_client_approval(&approval).await?;
            info!(scope = %consented, "Recorded client approval");
        }

        match self.approve_scopes(&mut request).await? {
            Approval::Approved => Ok(FlowStep::Completed(self.finalize(request).await?)),
            Approval::NeedsConsent
                if request.scope_requested.is_subset(&prior.union(&consented)) =>
            {
                error!(
                    request = %redact(&request.token),
                    scope = %request.scope_requested,
                    "Approval just recorded does not cover the requested scope"
                );
                Err(GrantError::invariant(
                    "recorded approval does not cover the requested scope",
                ))
            }
            Approval::NeedsConsent => {
                self.store.delete_grant_request(&request.token).await?;
                info!(request = %redact(&request.token), "Grant request denied by user");
                Ok(FlowStep::Denied(Denial {
                    redirect_uri: request.redirect_uri,
                    state: request.state,
                }))
            }
        }
    }

    /// Token endpoint: authenticate the client and redeem its code.
    pub async fn exchange_code(
        &self,
        client_name: &str,
        client_secret: &str,
        grant_type: &str,
        code: &str,
    ) -> GrantResult<TokenPair> {
        self.sweep_expired().await?;

        let client = self.authenticate_client(client_name, client_secret).await?;

        if grant_type != AUTHORIZATION_CODE_GRANT {
            return Err(GrantError::UnsupportedGrantType(grant_type.to_string()));
        }

        self.issue_code_exchange(&client, code).await
    }

    /// Resolve a bearer token for a resource server.
    pub async fn validate_access_token(&self, token: &str) -> GrantResult<AccessToken> {
        self.store
            .get_access_token(token)
            .await?
            .filter(AccessToken::is_valid)
            .ok_or(GrantError::InvalidToken)
    }

    async fn authenticate_client(&self, name: &str, secret: &str) -> GrantResult<Client> {
        match self.store.get_client_by_name(name).await? {
            Some(client) if client.verify_secret(secret) => Ok(client),
            _ => {
                warn!(client = %name, "Client authentication failed");
                Err(GrantError::Unauthorized)
            }
        }
    }

    async fn client_of(&self, request: &GrantRequest) -> GrantResult<Client> {
        self.store
            .get_client(request.client_uuid)
            .await?
            .ok_or_else(|| {
                error!(client_uuid = %request.client_uuid, "Client of a grant request has vanished");
                GrantError::invariant("client of grant request does not exist")
            })
    }
}
