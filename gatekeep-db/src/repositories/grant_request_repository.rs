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

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use gatekeep_core::models::{GrantRequest, ResponseType};
use gatekeep_core::{ScopeSet, WriteOutcome};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_uuid, scope_from_json, scope_to_json, write_outcome};

const COLUMNS: &str = "token, client_uuid, response_type, redirect_uri, state, \
     scope_requested, scope_approved, account_uuid, code, created_at, expires_at";

pub struct GrantRequestRepository {
    pool: SqlitePool,
}

impl GrantRequestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new request. A taken token is reported as `DuplicateKey`.
    pub async fn create(&self, request: &GrantRequest) -> Result<WriteOutcome> {
        let result = sqlx::query(&format!(
            "INSERT INTO grant_requests ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            COLUMNS
        ))
        .bind(&request.token)
        .bind(request.client_uuid.to_string())
        .bind(request.response_type.as_str())
        .bind(&request.redirect_uri)
        .bind(&request.state)
        .bind(scope_to_json(&request.scope_requested)?)
        .bind(scope_to_json(&request.scope_approved)?)
        .bind(request.account_uuid.map(|u| u.to_string()))
        .bind(&request.code)
        .bind(request.created_at)
        .bind(request.expires_at)
        .execute(&self.pool)
        .await;

        write_outcome(result, "Failed to create grant request")
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<GrantRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM grant_requests WHERE token = ?",
            COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find grant request by token")?;

        row.as_ref().map(grant_request_from_row).transpose()
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<GrantRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM grant_requests WHERE code = ?",
            COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find grant request by code")?;

        row.as_ref().map(grant_request_from_row).transpose()
    }

    /// Bind an account unless a different one already holds the request.
    pub async fn attach_account(&self, token: &str, account_uuid: Uuid) -> Result<WriteOutcome> {
        let account_uuid = account_uuid.to_string();
        let result = sqlx::query(
            r#"
            UPDATE grant_requests
            SET account_uuid = ?
            WHERE token = ? AND (account_uuid IS NULL OR account_uuid = ?)
            "#,
        )
        .bind(&account_uuid)
        .bind(token)
        .bind(&account_uuid)
        .execute(&self.pool)
        .await;

        let outcome = write_outcome(result, "Failed to attach account to grant request")?;
        self.conflict_if_present(outcome, token).await
    }

    /// Record the approved scope while no code has been issued.
    pub async fn approve_scope(&self, token: &str, scope: &ScopeSet) -> Result<WriteOutcome> {
        let result = sqlx::query(
            "UPDATE grant_requests SET scope_approved = ? WHERE token = ? AND code IS NULL",
        )
        .bind(scope_to_json(scope)?)
        .bind(token)
        .execute(&self.pool)
        .await;

        let outcome = write_outcome(result, "Failed to approve grant request scope")?;
        self.conflict_if_present(outcome, token).await
    }

    /// Store the one-time code. A request that already has one is a
    /// `Conflict`, a code held by another request is a `DuplicateKey`.
    pub async fn set_code(&self, token: &str, code: &str) -> Result<WriteOutcome> {
        let result =
            sqlx::query("UPDATE grant_requests SET code = ? WHERE token = ? AND code IS NULL")
                .bind(code)
                .bind(token)
                .execute(&self.pool)
                .await;

        let outcome = write_outcome(result, "Failed to set grant request code")?;
        self.conflict_if_present(outcome, token).await
    }

    /// A conditional update that touched nothing either lost its row or
    /// failed its condition.
    async fn conflict_if_present(
        &self,
        outcome: WriteOutcome,
        token: &str,
    ) -> Result<WriteOutcome> {
        if outcome != WriteOutcome::NotFound {
            return Ok(outcome);
        }

        let present: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM grant_requests WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check grant request")?;

        Ok(if present.is_some() {
            WriteOutcome::Conflict
        } else {
            WriteOutcome::NotFound
        })
    }

    pub async fn delete(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM grant_requests WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to delete grant request")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete and return the request holding `code` in one statement, so
    /// a code can be redeemed at most once.
    pub async fn consume_by_code(&self, code: &str) -> Result<Option<GrantRequest>> {
        let row = sqlx::query(&format!(
            "DELETE FROM grant_requests WHERE code = ? RETURNING {}",
            COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to consume grant request")?;

        row.as_ref().map(grant_request_from_row).transpose()
    }

    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<GrantRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM grant_requests WHERE expires_at <= ? ORDER BY expires_at",
            COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expired grant requests")?;

        rows.iter().map(grant_request_from_row).collect()
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM grant_requests WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to delete expired grant requests")?;

        Ok(result.rows_affected())
    }
}

fn grant_request_from_row(row: &SqliteRow) -> Result<GrantRequest> {
    let client_uuid: String = row.try_get("client_uuid")?;
    let response_type: String = row.try_get("response_type")?;
    let scope_requested: String = row.try_get("scope_requested")?;
    let scope_approved: String = row.try_get("scope_approved")?;
    let account_uuid: Option<String> = row.try_get("account_uuid")?;

    Ok(GrantRequest {
        token: row.try_get("token")?,
        client_uuid: parse_uuid(&client_uuid)?,
        response_type: response_type
            .parse::<ResponseType>()
            .map_err(|t| anyhow!("Invalid response type '{}' in database", t))?,
        redirect_uri: row.try_get("redirect_uri")?,
        state: row.try_get("state")?,
        scope_requested: scope_from_json(&scope_requested)?,
        scope_approved: scope_from_json(&scope_approved)?,
        account_uuid: account_uuid.as_deref().map(parse_uuid).transpose()?,
        code: row.try_get("code")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{sample_account, sample_client, seed};
    use crate::{AccountRepository, ClientRepository};
    use chrono::Duration;
    use gatekeep_core::ScopeSet;
    use pretty_assertions::assert_eq;

    async fn setup(pool: &SqlitePool) -> Result<GrantRequest> {
        let (client, _) = seed(pool).await?;
        Ok(request_for(&client))
    }

    fn request_for(client: &gatekeep_core::models::Client) -> GrantRequest {
        GrantRequest::new(
            client.uuid,
            ResponseType::Code,
            "http://localhost:8080/callback".to_string(),
            "xyz".to_string(),
            ScopeSet::from_iter(["read", "write"]),
            Duration::minutes(15),
        )
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_create_and_find_request(pool: SqlitePool) -> Result<()> {
        let request = setup(&pool).await?;
        let repo = GrantRequestRepository::new(pool);

        assert_eq!(repo.create(&request).await?, WriteOutcome::Applied);

        let found = repo.find_by_token(&request.token).await?.unwrap();
        assert_eq!(found.client_uuid, request.client_uuid);
        assert_eq!(found.response_type, ResponseType::Code);
        assert_eq!(found.scope_requested, request.scope_requested);
        assert!(found.scope_approved.is_empty());
        assert!(found.account_uuid.is_none());
        assert!(found.code.is_none());
        assert_eq!(found.expires_at, request.expires_at);

        assert!(repo.find_by_token("missing").await?.is_none());

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_duplicate_token_is_reported(pool: SqlitePool) -> Result<()> {
        let request = setup(&pool).await?;
        let repo = GrantRequestRepository::new(pool);

        repo.create(&request).await?;
        assert_eq!(repo.create(&request).await?, WriteOutcome::DuplicateKey);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_set_code_and_duplicate_code(pool: SqlitePool) -> Result<()> {
        let (client, account) = seed(&pool).await?;
        let first = request_for(&client);
        let mut second = first.clone();
        second.regenerate_token();
        let repo = GrantRequestRepository::new(pool);
        repo.create(&first).await?;
        repo.create(&second).await?;

        repo.attach_account(&first.token, account.uuid).await?;
        repo.approve_scope(&first.token, &first.scope_requested).await?;
        assert_eq!(repo.set_code(&first.token, "code-1").await?, WriteOutcome::Applied);

        let found = repo.find_by_code("code-1").await?.unwrap();
        assert_eq!(found.token, first.token);
        assert_eq!(found.account_uuid, Some(account.uuid));
        assert_eq!(found.scope_approved, first.scope_requested);

        assert_eq!(repo.set_code(&second.token, "code-1").await?, WriteOutcome::DuplicateKey);
        assert_eq!(repo.set_code("missing", "code-2").await?, WriteOutcome::NotFound);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_issued_code_is_never_replaced(pool: SqlitePool) -> Result<()> {
        let request = setup(&pool).await?;
        let repo = GrantRequestRepository::new(pool);
        repo.create(&request).await?;

        assert_eq!(repo.set_code(&request.token, "first").await?, WriteOutcome::Applied);
        assert_eq!(repo.set_code(&request.token, "second").await?, WriteOutcome::Conflict);
        assert_eq!(
            repo.approve_scope(&request.token, &ScopeSet::from_iter(["read"])).await?,
            WriteOutcome::Conflict
        );

        let found = repo.find_by_token(&request.token).await?.unwrap();
        assert_eq!(found.code.as_deref(), Some("first"));
        assert!(found.scope_approved.is_empty());
        assert!(repo.find_by_code("second").await?.is_none());

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_first_account_keeps_the_request(pool: SqlitePool) -> Result<()> {
        let (client, account) = seed(&pool).await?;
        let bob_account = sample_account("bob", "builder");
        AccountRepository::new(pool.clone()).create(&bob_account).await?;
        let request = request_for(&client);
        let repo = GrantRequestRepository::new(pool);
        repo.create(&request).await?;
        let alice = account.uuid;
        let bob = bob_account.uuid;

        assert_eq!(repo.attach_account(&request.token, alice).await?, WriteOutcome::Applied);
        assert_eq!(repo.attach_account(&request.token, alice).await?, WriteOutcome::Applied);
        assert_eq!(repo.attach_account(&request.token, bob).await?, WriteOutcome::Conflict);
        assert_eq!(repo.attach_account("missing", bob).await?, WriteOutcome::NotFound);

        let found = repo.find_by_token(&request.token).await?.unwrap();
        assert_eq!(found.account_uuid, Some(alice));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_consume_by_code_is_one_shot(pool: SqlitePool) -> Result<()> {
        let mut request = setup(&pool).await?;
        let repo = GrantRequestRepository::new(pool);
        let code = request.issue_code().to_string();
        repo.create(&request).await?;

        let consumed = repo.consume_by_code(&code).await?.unwrap();
        assert_eq!(consumed.token, request.token);
        assert!(repo.consume_by_code(&code).await?.is_none());
        assert!(repo.find_by_token(&request.token).await?.is_none());

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_concurrent_consume_has_one_winner(pool: SqlitePool) -> Result<()> {
        let mut request = setup(&pool).await?;
        let repo = GrantRequestRepository::new(pool);
        let code = request.issue_code().to_string();
        repo.create(&request).await?;

        let results =
            futures::future::join_all((0..5).map(|_| repo.consume_by_code(&code))).await;
        let winners = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Some(_))))
            .count();
        assert_eq!(winners, 1);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expired_requests(pool: SqlitePool) -> Result<()> {
        let live = setup(&pool).await?;
        let mut stale = live.clone();
        stale.regenerate_token();
        stale.expires_at = Utc::now() - Duration::minutes(1);
        let repo = GrantRequestRepository::new(pool);
        repo.create(&live).await?;
        repo.create(&stale).await?;

        let now = Utc::now();
        let expired = repo.list_expired(now).await?;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].token, stale.token);

        assert_eq!(repo.delete_expired(now).await?, 1);
        assert_eq!(repo.delete_expired(now).await?, 0);
        assert!(repo.find_by_token(&live.token).await?.is_some());

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_requests_go_with_their_client(pool: SqlitePool) -> Result<()> {
        let request = setup(&pool).await?;
        let repo = GrantRequestRepository::new(pool.clone());
        repo.create(&request).await?;

        ClientRepository::new(pool).delete("gin").await?;
        assert!(repo.find_by_token(&request.token).await?.is_none());

        // a request for an unknown client cannot be stored
        let orphan = GrantRequest {
            client_uuid: sample_client("tonic").uuid,
            ..request
        };
        assert!(repo.create(&orphan).await.is_err());

        Ok(())
    }
}
