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

//! Collaborators the grant engine depends on but does not implement.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AccessToken, Client, ClientApproval, GrantRequest, RefreshToken};
use crate::scope::ScopeSet;

/// Result of a keyed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// A unique key (token or code) is already taken. Nothing was written.
    DuplicateKey,
    /// The row to update no longer exists.
    NotFound,
    /// The row exists but its current state forbids the write. Nothing was
    /// written.
    Conflict,
}

/// Durable storage for the grant flow.
///
/// Every method is a single atomic operation on the backing store. In
/// particular `consume_grant_request_by_code` must read and delete in one
/// step so that two concurrent callers cannot both receive the record, and
/// inserts must report `DuplicateKey` instead of overwriting. Updates of a
/// grant request are conditional on the stored row, never on the caller's
/// copy of it.
#[async_trait]
pub trait OAuthStore: Send + Sync {
    async fn get_client(&self, uuid: Uuid) -> Result<Option<Client>>;
    async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>>;

    async fn create_grant_request(&self, request: &GrantRequest) -> Result<WriteOutcome>;
    async fn get_grant_request_by_token(&self, token: &str) -> Result<Option<GrantRequest>>;
    async fn get_grant_request_by_code(&self, code: &str) -> Result<Option<GrantRequest>>;
    /// Bind `account_uuid` to the request unless a different account is
    /// already bound (`Conflict`).
    async fn attach_grant_request_account(
        &self,
        token: &str,
        account_uuid: Uuid,
    ) -> Result<WriteOutcome>;
    /// Set the approved scope while no code is stored (`Conflict` otherwise).
    async fn approve_grant_request_scope(
        &self,
        token: &str,
        scope: &ScopeSet,
    ) -> Result<WriteOutcome>;
    /// Store `code` on a request that has none yet (`Conflict` otherwise).
    /// A code held by another request is reported as `DuplicateKey`.
    async fn set_grant_request_code(&self, token: &str, code: &str) -> Result<WriteOutcome>;
    /// Returns whether a row was deleted.
    async fn delete_grant_request(&self, token: &str) -> Result<bool>;
    /// Atomically delete and return the request holding `code`.
    async fn consume_grant_request_by_code(&self, code: &str) -> Result<Option<GrantRequest>>;
    async fn list_expired_grant_requests(&self, now: DateTime<Utc>) -> Result<Vec<GrantRequest>>;
    /// Delete every request with `expires_at <= now`, returning the count.
    async fn delete_expired_grant_requests(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn create_client_approval(&self, approval: &ClientApproval) -> Result<()>;
    async fn list_client_approvals(
        &self,
        client_uuid: Uuid,
        account_uuid: Uuid,
    ) -> Result<Vec<ClientApproval>>;

    async fn create_access_token(&self, token: &AccessToken) -> Result<WriteOutcome>;
    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>>;
    async fn create_refresh_token(&self, token: &RefreshToken) -> Result<WriteOutcome>;
}

/// Checks login credentials.
#[async_trait]
pub trait AccountVerifier: Send + Sync {
    /// Returns the account identity when `login` and `password` match an
    /// active account. Unknown login, wrong password and disabled account
    /// are indistinguishable to the caller.
    async fn verify(&self, login: &str, password: &str) -> Result<Option<Uuid>>;
}
