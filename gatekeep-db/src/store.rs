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

//! [`OAuthStore`] and [`AccountVerifier`] backed by SQLite.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatekeep_core::models::{
    AccessToken, Account, Client, ClientApproval, GrantRequest, RefreshToken,
};
use gatekeep_core::{AccountVerifier, OAuthStore, ScopeSet, WriteOutcome};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::repositories::{
    AccessTokenRepository, AccountRepository, ClientApprovalRepository, ClientRepository,
    GrantRequestRepository, RefreshTokenRepository,
};

pub struct SqliteStore {
    clients: ClientRepository,
    requests: GrantRequestRepository,
    approvals: ClientApprovalRepository,
    access_tokens: AccessTokenRepository,
    refresh_tokens: RefreshTokenRepository,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            clients: ClientRepository::new(pool.clone()),
            requests: GrantRequestRepository::new(pool.clone()),
            approvals: ClientApprovalRepository::new(pool.clone()),
            access_tokens: AccessTokenRepository::new(pool.clone()),
            refresh_tokens: RefreshTokenRepository::new(pool),
        }
    }
}

#[async_trait]
impl OAuthStore for SqliteStore {
    async fn get_client(&self, uuid: Uuid) -> Result<Option<Client>> {
        self.clients.find_by_uuid(uuid).await
    }

    async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        self.clients.find_by_name(name).await
    }

    async fn create_grant_request(&self, request: &GrantRequest) -> Result<WriteOutcome> {
        self.requests.create(request).await
    }

    async fn get_grant_request_by_token(&self, token: &str) -> Result<Option<GrantRequest>> {
        self.requests.find_by_token(token).await
    }

    async fn get_grant_request_by_code(&self, code: &str) -> Result<Option<GrantRequest>> {
        self.requests.find_by_code(code).await
    }

    async fn attach_grant_request_account(
        &self,
        token: &str,
        account_uuid: Uuid,
    ) -> Result<WriteOutcome> {
        self.requests.attach_account(token, account_uuid).await
    }

    async fn approve_grant_request_scope(
        &self,
        token: &str,
        scope: &ScopeSet,
    ) -> Result<WriteOutcome> {
        self.requests.approve_scope(token, scope).await
    }

    async fn set_grant_request_code(&self, token: &str, code: &str) -> Result<WriteOutcome> {
        self.requests.set_code(token, code).await
    }

    async fn delete_grant_request(&self, token: &str) -> Result<bool> {
        self.requests.delete(token).await
    }

    async fn consume_grant_request_by_code(&self, code: &str) -> Result<Option<GrantRequest>> {
        self.requests.consume_by_code(code).await
    }

    async fn list_expired_grant_requests(&self, now: DateTime<Utc>) -> Result<Vec<GrantRequest>> {
        self.requests.list_expired(now).await
    }

    async fn delete_expired_grant_requests(&self, now: DateTime<Utc>) -> Result<u64> {
        self.requests.delete_expired(now).await
    }

    async fn create_client_approval(&self, approval: &ClientApproval) -> Result<()> {
        self.approvals.create(approval).await
    }

    async fn list_client_approvals(
        &self,
        client_uuid: Uuid,
        account_uuid: Uuid,
    ) -> Result<Vec<ClientApproval>> {
        self.approvals.list_for(client_uuid, account_uuid).await
    }

    async fn create_access_token(&self, token: &AccessToken) -> Result<WriteOutcome> {
        self.access_tokens.create(token).await
    }

    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        self.access_tokens.find_by_token(token).await
    }

    async fn create_refresh_token(&self, token: &RefreshToken) -> Result<WriteOutcome> {
        self.refresh_tokens.create(token).await
    }
}

/// Checks credentials against the `accounts` table with argon2.
pub struct SqliteAccountVerifier {
    accounts: AccountRepository,
}

impl SqliteAccountVerifier {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
        }
    }
}

#[async_trait]
impl AccountVerifier for SqliteAccountVerifier {
    async fn verify(&self, login: &str, password: &str) -> Result<Option<Uuid>> {
        let account = self.accounts.find_by_login(login).await?;

        // argon2 runs even when there is nothing to check against
        let password = password.to_string();
        let (account, matched) = tokio::task::spawn_blocking(move || {
            let usable = account.as_ref().filter(|a| a.is_active);
            let matched = Account::verify_login(usable, &password)?;
            Ok::<_, anyhow::Error>((account, matched))
        })
        .await
        .context("Password verification task failed")??;

        match account {
            None => {
                debug!(login = %login, "Login for unknown account");
                Ok(None)
            }
            Some(account) if !account.is_active => {
                debug!(login = %login, "Login for inactive account");
                Ok(None)
            }
            Some(account) => Ok(matched.then_some(account.uuid)),
        }
    }
}
