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

use anyhow::{Context, Result};
use gatekeep_core::models::AccessToken;
use gatekeep_core::WriteOutcome;
use sqlx::{Row, SqlitePool};

use super::{parse_uuid, scope_from_json, scope_to_json, write_outcome};

pub struct AccessTokenRepository {
    pool: SqlitePool,
}

impl AccessTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, token: &AccessToken) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_tokens (token, client_uuid, account_uuid, scope, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.token)
        .bind(token.client_uuid.to_string())
        .bind(token.account_uuid.to_string())
        .bind(scope_to_json(&token.scope)?)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await;

        write_outcome(result, "Failed to create access token")
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query(
            r#"
            SELECT token, client_uuid, account_uuid, scope, expires_at, created_at
            FROM access_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find access token")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let client_uuid: String = row.try_get("client_uuid")?;
        let account_uuid: String = row.try_get("account_uuid")?;
        let scope: String = row.try_get("scope")?;

        Ok(Some(AccessToken {
            token: row.try_get("token")?,
            client_uuid: parse_uuid(&client_uuid)?,
            account_uuid: parse_uuid(&account_uuid)?,
            scope: scope_from_json(&scope)?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}
