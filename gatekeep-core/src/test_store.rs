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

//! In-memory collaborators for engine tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{AccessToken, Client, ClientApproval, GrantRequest, RefreshToken};
use crate::ports::{AccountVerifier, OAuthStore, WriteOutcome};
use crate::scope::ScopeSet;

#[derive(Default)]
struct Inner {
    clients: Vec<Client>,
    requests: HashMap<String, GrantRequest>,
    approvals: Vec<ClientApproval>,
    access_tokens: HashMap<String, AccessToken>,
    refresh_tokens: HashMap<String, RefreshToken>,
}

/// Store that keeps everything behind one mutex. Every trait method holds
/// the lock for its whole body, which gives the same atomicity the SQLite
/// store gets from single statements.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    forced_duplicates: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, client: Client) {
        self.inner.lock().unwrap().clients.push(client);
    }

    pub fn add_approval(&self, approval: ClientApproval) {
        self.inner.lock().unwrap().approvals.push(approval);
    }

    /// Put a request in place without any checks, e.g. an already expired one.
    pub fn insert_request(&self, request: GrantRequest) {
        self.inner
            .lock()
            .unwrap()
            .requests
            .insert(request.token.clone(), request);
    }

    /// Make the next `n` keyed writes report a duplicate key.
    pub fn force_duplicates(&self, n: usize) {
        self.forced_duplicates.store(n, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    pub fn approvals(&self) -> Vec<ClientApproval> {
        self.inner.lock().unwrap().approvals.clone()
    }

    pub fn access_tokens(&self) -> Vec<AccessToken> {
        self.inner.lock().unwrap().access_tokens.values().cloned().collect()
    }

    pub fn refresh_tokens(&self) -> Vec<RefreshToken> {
        self.inner.lock().unwrap().refresh_tokens.values().cloned().collect()
    }

    fn take_forced_duplicate(&self) -> bool {
        self.forced_duplicates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OAuthStore for MemoryStore {
    async fn get_client(&self, uuid: Uuid) -> Result<Option<Client>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.clients.iter().find(|c| c.uuid == uuid).cloned())
    }

    async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.clients.iter().find(|c| c.name == name).cloned())
    }

    async fn create_grant_request(&self, request: &GrantRequest) -> Result<WriteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if self.take_forced_duplicate() || inner.requests.contains_key(&request.token) {
            return Ok(WriteOutcome::DuplicateKey);
        }
        inner.requests.insert(request.token.clone(), request.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn get_grant_request_by_token(&self, token: &str) -> Result<Option<GrantRequest>> {
        Ok(self.inner.lock().unwrap().requests.get(token).cloned())
    }

    async fn get_grant_request_by_code(&self, code: &str) -> Result<Option<GrantRequest>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .requests
            .values()
            .find(|r| r.code.as_deref() == Some(code))
            .cloned())
    }

    async fn attach_grant_request_account(
        &self,
        token: &str,
        account_uuid: Uuid,
    ) -> Result<WriteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let Some(request) = inner.requests.get_mut(token) else {
            return Ok(WriteOutcome::NotFound);
        };
        if request.account_uuid.is_some_and(|existing| existing != account_uuid) {
            return Ok(WriteOutcome::Conflict);
        }
        request.account_uuid = Some(account_uuid);
        Ok(WriteOutcome::Applied)
    }

    async fn approve_grant_request_scope(
        &self,
        token: &str,
        scope: &ScopeSet,
    ) -> Result<WriteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let Some(request) = inner.requests.get_mut(token) else {
            return Ok(WriteOutcome::NotFound);
        };
        if request.code.is_some() {
            return Ok(WriteOutcome::Conflict);
        }
        request.scope_approved = scope.clone();
        Ok(WriteOutcome::Applied)
    }

    async fn set_grant_request_code(&self, token: &str, code: &str) -> Result<WriteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        match inner.requests.get(token) {
            None => return Ok(WriteOutcome::NotFound),
            Some(request) if request.code.is_some() => return Ok(WriteOutcome::Conflict),
            Some(_) => {}
        }
        let taken = inner
            .requests
            .values()
            .any(|r| r.code.as_deref() == Some(code));
        if taken || self.take_forced_duplicate() {
            return Ok(WriteOutcome::DuplicateKey);
        }
        if let Some(request) = inner.requests.get_mut(token) {
            request.code = Some(code.to_string());
        }
        Ok(WriteOutcome::Applied)
    }

    async fn delete_grant_request(&self, token: &str) -> Result<bool> {
        Ok(self.inner.lock().unwrap().requests.remove(token).is_some())
    }

    async fn consume_grant_request_by_code(&self, code: &str) -> Result<Option<GrantRequest>> {
        let mut inner = self.inner.lock().unwrap();
        let token = inner
            .requests
            .values()
            .find(|r| r.code.as_deref() == Some(code))
            .map(|r| r.token.clone());
        Ok(token.and_then(|t| inner.requests.remove(&t)))
    }

    async fn list_expired_grant_requests(&self, now: DateTime<Utc>) -> Result<Vec<GrantRequest>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .requests
            .values()
            .filter(|r| r.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn delete_expired_grant_requests(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.requests.len();
        inner.requests.retain(|_, r| !r.is_expired_at(now));
        Ok((before - inner.requests.len()) as u64)
    }

    async fn create_client_approval(&self, approval: &ClientApproval) -> Result<()> {
        self.inner.lock().unwrap().approvals.push(approval.clone());
        Ok(())
    }

    async fn list_client_approvals(
        &self,
        client_uuid: Uuid,
        account_uuid: Uuid,
    ) -> Result<Vec<ClientApproval>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .approvals
            .iter()
            .filter(|a| a.client_uuid == client_uuid && a.account_uuid == account_uuid)
            .cloned()
            .collect())
    }

    async fn create_access_token(&self, token: &AccessToken) -> Result<WriteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if self.take_forced_duplicate() || inner.access_tokens.contains_key(&token.token) {
            return Ok(WriteOutcome::DuplicateKey);
        }
        inner.access_tokens.insert(token.token.clone(), token.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(self.inner.lock().unwrap().access_tokens.get(token).cloned())
    }

    async fn create_refresh_token(&self, token: &RefreshToken) -> Result<WriteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if self.take_forced_duplicate() || inner.refresh_tokens.contains_key(&token.token) {
            return Ok(WriteOutcome::DuplicateKey);
        }
        inner.refresh_tokens.insert(token.token.clone(), token.clone());
        Ok(WriteOutcome::Applied)
    }
}

/// Accounts with plain-text passwords, good enough for tests.
#[derive(Default)]
pub struct MemoryAccounts {
    accounts: HashMap<String, (String, Uuid)>,
}

impl MemoryAccounts {
    pub fn with(mut self, login: &str, password: &str) -> Self {
        self.accounts
            .insert(login.to_string(), (password.to_string(), Uuid::new_v4()));
        self
    }

    pub fn uuid_of(&self, login: &str) -> Uuid {
        self.accounts[login].1
    }
}

#[async_trait]
impl AccountVerifier for MemoryAccounts {
    async fn verify(&self, login: &str, password: &str) -> Result<Option<Uuid>> {
        Ok(self
            .accounts
            .get(login)
            .filter(|(expected, _)| expected == password)
            .map(|(_, uuid)| *uuid))
    }
}
