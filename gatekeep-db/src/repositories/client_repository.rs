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
use gatekeep_core::models::Client;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_uuid, scope_from_json, scope_to_json};

pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, client: &Client) -> Result<()> {
        let redirect_uris = serde_json::to_string(&client.redirect_uris)?;

        sqlx::query(
            r#"
            INSERT INTO clients (uuid, name, secret, redirect_uris, scope, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client.uuid.to_string())
        .bind(&client.name)
        .bind(&client.secret)
        .bind(redirect_uris)
        .bind(scope_to_json(&client.scope)?)
        .bind(client.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create client '{}'", client.name))?;

        Ok(())
    }

    pub async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, name, secret, redirect_uris, scope, created_at
            FROM clients
            WHERE uuid = ?
            "#,
        )
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find client by uuid")?;

        row.as_ref().map(client_from_row).transpose()
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, name, secret, redirect_uris, scope, created_at
            FROM clients
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find client by name")?;

        row.as_ref().map(client_from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            r#"
            SELECT uuid, name, secret, redirect_uris, scope, created_at
            FROM clients
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list clients")?;

        rows.iter().map(client_from_row).collect()
    }

    /// Returns whether a client was deleted. Its grant requests, approvals
    /// and tokens go with it.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete client")?;

        Ok(result.rows_affected() > 0)
    }
}

fn client_from_row(row: &SqliteRow) -> Result<Client> {
    let uuid: String = row.try_get("uuid")?;
    let redirect_uris: String = row.try_get("redirect_uris")?;
    let scope: String = row.try_get("scope")?;

    Ok(Client {
        uuid: parse_uuid(&uuid)?,
        name: row.try_get("name")?,
        secret: row.try_get("secret")?,
        redirect_uris: serde_json::from_str(&redirect_uris)?,
        scope: scope_from_json(&scope)?,
        created_at: row.try_get("created_at")?,
    })
}
