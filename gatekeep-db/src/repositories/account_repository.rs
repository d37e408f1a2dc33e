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
use chrono::Utc;
use gatekeep_core::models::Account;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (uuid, login, email, password_hash, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.uuid.to_string())
        .bind(&account.login)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create account '{}'", account.login))?;

        Ok(())
    }

    pub async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, login, email, password_hash, is_active, created_at, updated_at
            FROM accounts
            WHERE uuid = ?
            "#,
        )
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find account by uuid")?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, login, email, password_hash, is_active, created_at, updated_at
            FROM accounts
            WHERE login = ?
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find account by login")?;

        row.as_ref().map(account_from_row).transpose()
    }

    /// Persist the password hash and active flag of an existing account.
    pub async fn update(&self, account: &Account) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = ?, is_active = ?, updated_at = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&account.password_hash)
        .bind(account.is_active)
        .bind(Utc::now())
        .bind(account.uuid.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update account")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Account '{}' does not exist", account.login);
        }

        Ok(())
    }
}

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let uuid: String = row.try_get("uuid")?;

    Ok(Account {
        uuid: parse_uuid(&uuid)?,
        login: row.try_get("login")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
