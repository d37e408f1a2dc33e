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
use gatekeep_core::models::ClientApproval;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_uuid, scope_from_json, scope_to_json};

pub struct ClientApprovalRepository {
    pool: SqlitePool,
}

impl ClientApprovalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, approval: &ClientApproval) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO client_approvals (uuid, client_uuid, account_uuid, scope, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(approval.uuid.to_string())
        .bind(approval.client_uuid.to_string())
        .bind(approval.account_uuid.to_string())
        .bind(scope_to_json(&approval.scope)?)
        .bind(approval.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create client approval")?;

        Ok(())
    }

    /// Every approval `account_uuid` gave to `client_uuid`, oldest first.
    pub async fn list_for(
        &self,
        client_uuid: Uuid,
        account_uuid: Uuid,
    ) -> Result<Vec<ClientApproval>> {
        let rows = sqlx::query(
            r#"
            SELECT uuid, client_uuid, account_uuid, scope, created_at
            FROM client_approvals
            WHERE client_uuid = ? AND account_uuid = ?
            ORDER BY created_at
            "#,
        )
        .bind(client_uuid.to_string())
        .bind(account_uuid.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list client approvals")?;

        rows.iter()
            .map(|row| {
                let uuid: String = row.try_get("uuid")?;
                let client_uuid: String = row.try_get("client_uuid")?;
                let account_uuid: String = row.try_get("account_uuid")?;
                let scope: String = row.try_get("scope")?;

                Ok(ClientApproval {
                    uuid: parse_uuid(&uuid)?,
                    client_uuid: parse_uuid(&client_uuid)?,
                    account_uuid: parse_uuid(&account_uuid)?,
                    scope: scope_from_json(&scope)?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
