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

use anyhow::Result;
use gatekeep_core::models::{Account, Client};
use gatekeep_core::{GrantEngine, ScopeSet};
use gatekeep_db::{AccountRepository, ClientRepository, SqliteAccountVerifier, SqliteStore};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{
    configuration::{parser::TomlConfig, Configuration},
    rate_limit::create_login_rate_limiter,
    templates::init_templates,
    AppState,
};

pub const CALLBACK: &str = "http://localhost:8080/callback";
pub const CLIENT_SECRET: &str = "gin-secret-123";

/// Build application state around a migrated pool, with built-in defaults
/// for everything else.
pub fn create_test_app_state(pool: SqlitePool) -> Result<AppState> {
    let mut config = Configuration::from_toml(&TomlConfig::default())?;
    config.scopes.insert("admin".into(), "Administer the service".into());

    let engine = GrantEngine::new(
        Arc::new(SqliteStore::new(pool.clone())),
        Arc::new(SqliteAccountVerifier::new(pool)),
        Arc::new(config.scope_catalog()),
        config.grant_settings(),
    );

    Ok(AppState::new(
        engine,
        Arc::new(init_templates(false)?),
        config,
        create_login_rate_limiter(1000),
    ))
}

/// Store the client "gin" (scope read, write) and the account "alice"
/// (password "wonderland").
pub async fn seed(pool: &SqlitePool) -> Result<(Client, Account)> {
    let client = Client::new(
        "gin".to_string(),
        CLIENT_SECRET.to_string(),
        vec![CALLBACK.to_string()],
        ScopeSet::from_iter(["read", "write"]),
    )?;
    let account = Account::new("alice".into(), "alice@example.com".into(), "wonderland")?;

    ClientRepository::new(pool.clone()).create(&client).await?;
    AccountRepository::new(pool.clone()).create(&account).await?;

    Ok((client, account))
}
